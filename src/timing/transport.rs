use super::{Clock, EventScheduler};
use crate::audio::{RendererBackend, SoundRenderer, Trigger, Volume};
use crate::error::PlaybackError;
use crate::score::Score;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Disposed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Idle => "idle",
            TransportState::Loaded => "loaded",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Result of one renderer driver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpOutcome {
    pub fired: usize,
    /// The transport reached the end of the score and paused itself.
    pub finished: bool,
}

/// The logical playback clock of a session, and the owner of its schedule
/// and its sound output.
///
/// Position is derived from the clock: while playing it is the position at
/// the last anchor plus the clock time elapsed since, clamped to the score's
/// total duration. Pausing re-anchors and stops the clock from counting.
pub struct Transport {
    clock: Arc<dyn Clock>,
    backend: Arc<dyn RendererBackend>,
    renderer: Option<Box<dyn SoundRenderer>>,
    scheduler: EventScheduler,
    score: Option<Arc<Score>>,
    state: TransportState,
    anchor_position: f64,
    anchor_time: Duration,
    volume: Volume,
    finish_at_end: bool,
}

impl Transport {
    pub fn new(clock: Arc<dyn Clock>, backend: Arc<dyn RendererBackend>) -> Self {
        Self {
            clock,
            backend,
            renderer: None,
            scheduler: EventScheduler::new(),
            score: None,
            state: TransportState::Idle,
            anchor_position: 0.0,
            anchor_time: Duration::ZERO,
            volume: Volume::FULL,
            finish_at_end: true,
        }
    }

    /// Whether the transport pauses itself once the end of the score is reached.
    pub fn set_finish_at_end(&mut self, finish_at_end: bool) {
        self.finish_at_end = finish_at_end;
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn score(&self) -> Option<&Arc<Score>> {
        self.score.as_ref()
    }

    pub fn total_duration(&self) -> f64 {
        self.score.as_ref().map_or(0.0, |s| s.total_duration())
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn has_output(&self) -> bool {
        self.renderer.is_some()
    }

    /// Seconds into the score, always within `[0, total_duration]`.
    pub fn position(&self) -> f64 {
        let position = if self.state == TransportState::Playing {
            let elapsed = self.clock.now().saturating_sub(self.anchor_time);
            self.anchor_position + elapsed.as_secs_f64()
        } else {
            self.anchor_position
        };
        position.clamp(0.0, self.total_duration())
    }

    /// Position as a fraction of the total duration; 0 for an empty score.
    pub fn progress(&self) -> f64 {
        let total = self.total_duration();
        if total > 0.0 {
            self.position() / total
        } else {
            0.0
        }
    }

    /// Opens the sound output if the transport has none yet.
    pub fn acquire_output(&mut self) -> Result<(), PlaybackError> {
        self.ensure_live("acquire_output")?;
        if self.renderer.is_none() {
            let renderer = self.backend.open()?;
            debug!("opened sound output");
            self.renderer = Some(renderer);
        }
        Ok(())
    }

    /// Replaces the active score. Whatever was scheduled for the previous
    /// score is cancelled before the new one is placed on the clock.
    pub fn load(&mut self, score: Arc<Score>) -> Result<(), PlaybackError> {
        self.ensure_live("load")?;
        self.scheduler.cancel_all();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.silence();
        }

        self.scheduler.schedule(&score, 0.0);
        info!(
            notes = score.note_count(),
            duration = score.total_duration(),
            "score loaded"
        );
        self.score = Some(score);
        self.anchor_position = 0.0;
        self.anchor_time = self.clock.now();
        self.transition(TransportState::Loaded);
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.ensure_live("play")?;
        match self.state {
            TransportState::Loaded | TransportState::Paused => {
                let total = self.total_duration();
                if total > 0.0 && self.anchor_position >= total && self.finish_at_end {
                    // playing from the end starts over
                    self.reposition(0.0);
                }
                self.anchor_time = self.clock.now();
                self.transition(TransportState::Playing);
            }
            TransportState::Idle | TransportState::Playing | TransportState::Disposed => {}
        }
        Ok(())
    }

    /// Freezes the clock. Unfired triggers stay scheduled for when playback resumes.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.ensure_live("pause")?;
        if self.state == TransportState::Playing {
            self.anchor_position = self.position();
            self.anchor_time = self.clock.now();
            self.transition(TransportState::Paused);
        }
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), PlaybackError> {
        if self.state == TransportState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Moves to `fraction` of the score (clamped to `[0, 1]`) without
    /// changing the play/pause state. A no-op while nothing is loaded.
    pub fn seek(&mut self, fraction: f64) -> Result<(), PlaybackError> {
        self.ensure_live("seek")?;
        if self.score.is_none() {
            return Ok(());
        }
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let position = fraction * self.total_duration();
        self.reposition(position);
        debug!(position, "seek");
        Ok(())
    }

    pub fn set_volume(&mut self, level: f32) -> Result<(), PlaybackError> {
        self.ensure_live("set_volume")?;
        self.volume = Volume::new(level);
        debug!(level = self.volume.level(), db = self.volume.to_decibels(), "volume");
        Ok(())
    }

    /// Fires every trigger due at the current position. Nothing fires unless
    /// the transport is playing.
    pub fn pump(&mut self) -> PumpOutcome {
        if self.state != TransportState::Playing {
            return PumpOutcome::default();
        }

        let position = self.position();
        let gain_db = self.volume.to_decibels();
        let mut outcome = PumpOutcome::default();

        if let Some(handle) = self.scheduler.active_mut() {
            let renderer = &mut self.renderer;
            outcome.fired = handle.fire_due(position, |pending| {
                if let Some(renderer) = renderer.as_mut() {
                    renderer.trigger(&Trigger {
                        pitch: pending.pitch,
                        time: pending.time,
                        duration: pending.duration,
                        velocity: pending.velocity,
                        gain_db,
                    });
                }
            });
        }

        let total = self.total_duration();
        if self.finish_at_end && position >= total {
            self.anchor_position = total;
            self.anchor_time = self.clock.now();
            self.transition(TransportState::Paused);
            outcome.finished = true;
        }
        outcome
    }

    /// Cancels the schedule and releases the sound output. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        if self.state == TransportState::Disposed {
            return;
        }
        self.scheduler.cancel_all();
        if let Some(mut renderer) = self.renderer.take() {
            renderer.silence();
        }
        self.score = None;
        self.anchor_position = 0.0;
        self.transition(TransportState::Disposed);
        info!("transport disposed");
    }

    fn reposition(&mut self, position: f64) {
        self.anchor_position = position;
        self.anchor_time = self.clock.now();
        if let Some(score) = self.score.clone() {
            let handle = self.scheduler.schedule(&score, 0.0);
            handle.skip_before(position);
        }
    }

    fn ensure_live(&self, operation: &'static str) -> Result<(), PlaybackError> {
        if self.state == TransportState::Disposed {
            Err(PlaybackError::InvalidState { operation })
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, next: TransportState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "transport");
            self.state = next;
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.dispose();
    }
}
