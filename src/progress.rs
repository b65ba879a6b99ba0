use crate::catalog::format_clock;
use crate::timing::{Ticker, Transport};
use crossbeam::channel::Receiver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// What the UI needs to draw a progress bar and the play/pause button.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub position: f64,
    pub total_duration: f64,
    /// `position / total_duration`, 0 for an empty score
    pub progress: f64,
    pub is_playing: bool,
}

impl ProgressSnapshot {
    pub fn of(transport: &Transport) -> Self {
        Self {
            position: transport.position(),
            total_duration: transport.total_duration(),
            progress: transport.progress(),
            is_playing: transport.is_playing(),
        }
    }

    /// `mm:ss / mm:ss`
    pub fn label(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.position),
            format_clock(self.total_duration)
        )
    }
}

/// Samples the transport on a fixed period while playback runs. The timer is
/// held by a [`Ticker`], so stopping the reporter releases it.
pub struct ProgressReporter {
    period: Duration,
    ticker: Option<Ticker>,
    live: Arc<AtomicUsize>,
}

impl ProgressReporter {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counts this reporter's timer in a shared counter, e.g. one that also
    /// tracks other periodic tasks of the same session.
    pub fn with_live_counter(period: Duration, live: Arc<AtomicUsize>) -> Self {
        Self {
            period,
            ticker: None,
            live,
        }
    }

    /// Starts sampling; a no-op when already sampling.
    pub fn start(&mut self) {
        if self.ticker.is_none() {
            self.ticker = Some(Ticker::start(self.period, &self.live));
        }
    }

    pub fn stop(&mut self) {
        self.ticker = None;
    }

    pub fn is_sampling(&self) -> bool {
        self.ticker.is_some()
    }

    /// Number of sampling timers currently alive; never more than one.
    pub fn live_timers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> Option<&Receiver<Instant>> {
        self.ticker.as_ref().map(Ticker::receiver)
    }

    /// Reads the transport. Returns `None` unless it is playing.
    pub fn sample(&self, transport: &Transport) -> Option<ProgressSnapshot> {
        (self.is_sampling() && transport.is_playing()).then(|| ProgressSnapshot::of(transport))
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullBackend;
    use crate::score::{NoteEvent, Score, Track};
    use crate::timing::ManualClock;

    fn playing_transport(clock: &ManualClock) -> Transport {
        let mut transport = Transport::new(Arc::new(clock.clone()), Arc::new(NullBackend));
        transport
            .load(Arc::new(Score::new(vec![Track::new(vec![NoteEvent::new(
                60, 0.0, 4.0, 1.0,
            )])])))
            .unwrap();
        transport.play().unwrap();
        transport
    }

    #[test]
    fn test_samples_only_while_playing() {
        let clock = ManualClock::new();
        let mut transport = playing_transport(&clock);
        let mut reporter = ProgressReporter::new(Duration::from_millis(5));
        assert!(reporter.sample(&transport).is_none());

        reporter.start();
        clock.advance_secs(1.0);
        let snapshot = reporter.sample(&transport).unwrap();
        assert_eq!(snapshot.position, 1.0);
        assert_eq!(snapshot.progress, 0.25);
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.label(), "00:01 / 00:04");

        transport.pause().unwrap();
        assert!(reporter.sample(&transport).is_none());
    }

    #[test]
    fn test_start_stop_pairs_timer() {
        let mut reporter = ProgressReporter::new(Duration::from_millis(5));
        reporter.start();
        reporter.start();
        assert_eq!(reporter.live_timers(), 1);
        assert!(reporter.ticks().is_some());
        reporter.stop();
        reporter.stop();
        assert_eq!(reporter.live_timers(), 0);
        assert!(reporter.ticks().is_none());
    }
}
