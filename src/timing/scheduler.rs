use crate::score::{Pitch, Score};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// A note placed on the transport clock, waiting to fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTrigger {
    pub pitch: Pitch,
    pub time: f64,
    pub duration: f64,
    pub velocity: f32,
}

/// Shared cancellation flag of a [`ScheduledHandle`]. Triggers fire while the
/// flag's lock is held, so once [`cancel`](Self::cancel) returns no trigger
/// of the handle fires again, including one that was due at that very moment.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<Mutex<bool>>,
}

impl CancelToken {
    pub fn cancel(&self) {
        *self.cancelled.lock() = true;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }
}

/// The triggers of one scheduled score, ordered by clock time.
pub struct ScheduledHandle {
    id: u64,
    queue: VecDeque<PendingTrigger>,
    token: CancelToken,
}

impl ScheduledHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_time(&self) -> Option<f64> {
        self.queue.front().map(|t| t.time)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel_all(&mut self) {
        self.token.cancel();
        self.queue.clear();
    }

    /// Drops triggers strictly before `time` without firing them, returning
    /// how many were dropped.
    pub fn skip_before(&mut self, time: f64) -> usize {
        let mut skipped = 0;
        while self.queue.front().is_some_and(|t| t.time < time) {
            self.queue.pop_front();
            skipped += 1;
        }
        skipped
    }

    /// Fires, in time order, every trigger at or before `now`. `fire` must not
    /// cancel this handle's token.
    pub fn fire_due(&mut self, now: f64, mut fire: impl FnMut(&PendingTrigger)) -> usize {
        let mut fired = 0;
        while self.queue.front().is_some_and(|t| t.time <= now) {
            let cancelled = self.token.cancelled.lock();
            if *cancelled {
                drop(cancelled);
                self.queue.clear();
                break;
            }
            if let Some(trigger) = self.queue.pop_front() {
                fire(&trigger);
                fired += 1;
            }
        }
        fired
    }
}

/// Places every note of `score` on the clock at `clock_origin + start_time`.
/// Notes are not validated against the score's total duration.
pub fn schedule_score(score: &Score, clock_origin: f64, id: u64) -> ScheduledHandle {
    let mut triggers: Vec<PendingTrigger> = score
        .notes()
        .map(|note| PendingTrigger {
            pitch: note.pitch(),
            time: clock_origin + note.start_time(),
            duration: note.duration(),
            velocity: note.velocity(),
        })
        .collect();

    // stable, so simultaneous notes keep track order
    triggers.sort_by(|a, b| a.time.total_cmp(&b.time));

    ScheduledHandle {
        id,
        queue: triggers.into(),
        token: CancelToken::default(),
    }
}

/// Owns the active handle of a session. Scheduling a score cancels whatever
/// was scheduled before it.
#[derive(Default)]
pub struct EventScheduler {
    next_id: u64,
    active: Option<ScheduledHandle>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, score: &Score, clock_origin: f64) -> &mut ScheduledHandle {
        self.cancel_all();
        self.next_id += 1;
        let handle = schedule_score(score, clock_origin, self.next_id);
        debug!(
            handle = handle.id(),
            triggers = handle.pending(),
            "scheduled score"
        );
        self.active.insert(handle)
    }

    pub fn cancel_all(&mut self) {
        if let Some(mut handle) = self.active.take() {
            handle.cancel_all();
            debug!(handle = handle.id(), "cancelled schedule");
        }
    }

    pub fn active(&self) -> Option<&ScheduledHandle> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ScheduledHandle> {
        self.active.as_mut()
    }
}
