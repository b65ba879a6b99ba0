mod capture;
mod voice;

#[cfg(feature = "cpal-output")]
mod synth;

pub use capture::{CaptureBackend, CapturedTrigger};
pub use voice::{AdsrConfig, EnvelopeState, Voice};

#[cfg(feature = "cpal-output")]
pub use synth::SynthBackend;

use crate::error::RendererError;
use crate::score::Pitch;
use serde::{Deserialize, Serialize};

/// Session master volume as a linear level in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(f32);

impl Volume {
    pub const FULL: Volume = Volume(1.0);

    /// Out of range levels are clamped; NaN is treated as silence.
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            Volume(0.0)
        } else {
            Volume(level.clamp(0.0, 1.0))
        }
    }

    pub fn level(self) -> f32 {
        self.0
    }

    /// Gain in decibels as used by renderers. Silence maps to `-inf`.
    pub fn to_decibels(self) -> f32 {
        gain_to_db(self.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::FULL
    }
}

pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.log10()
}

pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Instruction to emit one note. `time` is the position on the transport
/// clock the note was scheduled for; `gain_db` is the master gain in effect
/// when the trigger fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub pitch: Pitch,
    pub time: f64,
    pub duration: f64,
    pub velocity: f32,
    pub gain_db: f32,
}

/// Sound output for one session. Triggers arrive when they are due and must
/// start sounding immediately. Renderers live on the thread that opened them.
pub trait SoundRenderer {
    fn trigger(&mut self, trigger: &Trigger);

    /// Cut every sounding voice.
    fn silence(&mut self);
}

/// Opens renderers. A session opens one on first use and drops it on dispose.
pub trait RendererBackend: Send + Sync {
    fn open(&self) -> Result<Box<dyn SoundRenderer>, RendererError>;
}

/// Renderer that discards everything.
pub struct NullRenderer;

impl SoundRenderer for NullRenderer {
    fn trigger(&mut self, _trigger: &Trigger) {}

    fn silence(&mut self) {}
}

pub struct NullBackend;

impl RendererBackend for NullBackend {
    fn open(&self) -> Result<Box<dyn SoundRenderer>, RendererError> {
        Ok(Box::new(NullRenderer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamps() {
        assert_eq!(Volume::new(1.5).level(), 1.0);
        assert_eq!(Volume::new(-0.5).level(), 0.0);
        assert_eq!(Volume::new(f32::NAN).level(), 0.0);
    }

    #[test]
    fn test_decibels() {
        assert_eq!(Volume::FULL.to_decibels(), 0.0);
        assert!((Volume::new(0.5).to_decibels() + 6.0206).abs() < 1e-3);
        assert_eq!(Volume::new(0.0).to_decibels(), f32::NEG_INFINITY);
        assert!((db_to_gain(Volume::new(0.25).to_decibels()) - 0.25).abs() < 1e-6);
        assert_eq!(db_to_gain(f32::NEG_INFINITY), 0.0);
    }
}
