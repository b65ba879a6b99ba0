use super::{RendererBackend, SoundRenderer, Trigger};
use crate::error::RendererError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedTrigger {
    /// Which renderer received the trigger, counting opens from 0.
    pub renderer: usize,
    pub trigger: Trigger,
}

#[derive(Default)]
struct CaptureState {
    triggers: Mutex<Vec<CapturedTrigger>>,
    opened: AtomicUsize,
    released: AtomicUsize,
    silenced: AtomicUsize,
    unavailable: AtomicBool,
}

/// Backend whose renderers record every trigger instead of producing sound.
/// Clones observe the same recording, so a copy can be kept for inspection
/// after the original has been handed to a session.
#[derive(Clone, Default)]
pub struct CaptureBackend {
    state: Arc<CaptureState>,
}

impl CaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that refuses to open until [`set_available`](Self::set_available) is called.
    pub fn unavailable() -> Self {
        let backend = Self::default();
        backend.set_available(false);
        backend
    }

    pub fn set_available(&self, available: bool) {
        self.state.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn triggers(&self) -> Vec<CapturedTrigger> {
        self.state.triggers.lock().clone()
    }

    pub fn pitches(&self) -> Vec<u8> {
        self.state
            .triggers
            .lock()
            .iter()
            .map(|c| c.trigger.pitch.midi())
            .collect()
    }

    pub fn clear(&self) {
        self.state.triggers.lock().clear();
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn silenced(&self) -> usize {
        self.state.silenced.load(Ordering::SeqCst)
    }
}

impl RendererBackend for CaptureBackend {
    fn open(&self) -> Result<Box<dyn SoundRenderer>, RendererError> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(RendererError::NoOutputDevice);
        }
        let index = self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CaptureRenderer {
            index,
            state: self.state.clone(),
        }))
    }
}

struct CaptureRenderer {
    index: usize,
    state: Arc<CaptureState>,
}

impl SoundRenderer for CaptureRenderer {
    fn trigger(&mut self, trigger: &Trigger) {
        self.state.triggers.lock().push(CapturedTrigger {
            renderer: self.index,
            trigger: *trigger,
        });
    }

    fn silence(&mut self) {
        self.state.silenced.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for CaptureRenderer {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
