use crossbeam::channel::{self, Receiver};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A periodic timer that exists exactly as long as the value does. Dropping
/// it is the only way to stop it, so every start is paired with one stop.
pub struct Ticker {
    rx: Receiver<Instant>,
    live: Arc<AtomicUsize>,
}

impl Ticker {
    /// Starts a timer, counting it in `live` until dropped.
    pub fn start(period: Duration, live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            rx: channel::tick(period),
            live: live.clone(),
        }
    }

    pub fn receiver(&self) -> &Receiver<Instant> {
        &self.rx
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
