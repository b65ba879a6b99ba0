use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsrConfig {
    /// Seconds
    pub attack: f32,
    /// Seconds
    pub decay: f32,
    /// 0.0 -> 1.0
    pub sustain: f32,
    /// Seconds
    pub release: f32,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.1,
            sustain: 0.3,
            release: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeState {
    Attack { time: f32 },
    Decay { time: f32 },
    Sustain,
    Release { time: f32 },
}

/// One sounding note. The gate closes by itself after the note's duration,
/// after which the voice plays out its release.
#[derive(Debug, Clone)]
pub struct Voice {
    frequency: f32,
    /// velocity times master gain, fixed when the note starts
    amplitude: f32,
    gate_remaining: f32,
    envelope_state: EnvelopeState,
    envelope_level: f32,
    phase: f32,
}

impl Voice {
    pub fn new(frequency: f32, amplitude: f32, duration: f32) -> Self {
        Self {
            frequency,
            amplitude,
            gate_remaining: duration.max(0.0),
            envelope_state: EnvelopeState::Attack { time: 0.0 },
            envelope_level: 0.0,
            phase: 0.0,
        }
    }

    pub fn envelope_state(&self) -> EnvelopeState {
        self.envelope_state
    }

    pub fn release(&mut self) {
        if !matches!(self.envelope_state, EnvelopeState::Release { .. }) {
            self.envelope_state = EnvelopeState::Release { time: 0.0 };
        }
    }

    pub fn is_finished(&self, adsr: &AdsrConfig) -> bool {
        matches!(self.envelope_state, EnvelopeState::Release { time } if time >= adsr.release)
    }

    /// Renders one sample and advances the voice by one sample period.
    pub fn render_sample(&mut self, adsr: &AdsrConfig, sample_rate: f32) -> f32 {
        let envelope = self.envelope(adsr);
        // triangle keeps the timbre soft without a wavetable
        let wave = 1.0 - 4.0 * (self.phase - 0.5).abs();
        let sample = wave * envelope * self.amplitude;

        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let dt = 1.0 / sample_rate;
        if self.gate_remaining > 0.0 {
            self.gate_remaining -= dt;
            if self.gate_remaining <= 0.0 {
                self.release();
            }
        }
        self.advance_envelope(adsr, dt);
        sample
    }

    fn envelope(&self, adsr: &AdsrConfig) -> f32 {
        match self.envelope_state {
            EnvelopeState::Attack { time } => {
                if adsr.attack == 0.0 {
                    1.0
                } else {
                    (time / adsr.attack).min(1.0)
                }
            }
            EnvelopeState::Decay { time } => {
                let decay_progress = if adsr.decay == 0.0 {
                    1.0
                } else {
                    (time / adsr.decay).min(1.0)
                };
                1.0 - (1.0 - adsr.sustain) * decay_progress
            }
            EnvelopeState::Sustain => adsr.sustain,
            EnvelopeState::Release { time } => {
                let release_progress = if adsr.release == 0.0 {
                    1.0
                } else {
                    (time / adsr.release).min(1.0)
                };
                self.envelope_level * (1.0 - release_progress)
            }
        }
    }

    fn advance_envelope(&mut self, adsr: &AdsrConfig, dt: f32) {
        match &mut self.envelope_state {
            EnvelopeState::Attack { time } => {
                *time += dt;
                if *time >= adsr.attack {
                    self.envelope_state = EnvelopeState::Decay { time: 0.0 };
                    self.envelope_level = 1.0;
                } else {
                    self.envelope_level = self.envelope(adsr);
                }
            }
            EnvelopeState::Decay { time } => {
                *time += dt;
                if *time >= adsr.decay {
                    self.envelope_state = EnvelopeState::Sustain;
                    self.envelope_level = adsr.sustain;
                } else {
                    self.envelope_level = self.envelope(adsr);
                }
            }
            EnvelopeState::Sustain => {
                self.envelope_level = adsr.sustain;
            }
            // level stays where the gate closed; envelope() fades from it
            EnvelopeState::Release { time } => {
                *time += dt;
            }
        }
    }
}
