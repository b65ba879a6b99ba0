use super::{AdsrConfig, RendererBackend, SoundRenderer, Trigger, Voice, db_to_gain};
use crate::error::RendererError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Producer, Split},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

const MAX_VOICES: usize = 64;
const COMMAND_CAPACITY: usize = 1024;
const HEADROOM: f32 = 0.25;

/// A note for the audio callback. `generation` is the silence count at the
/// time of the trigger; notes from before the latest silence are dropped.
struct NoteOn {
    frequency: f32,
    amplitude: f32,
    duration: f32,
    generation: u64,
}

/// Polyphonic synth on the default output device.
pub struct SynthBackend {
    adsr: AdsrConfig,
}

impl SynthBackend {
    pub fn new() -> Self {
        Self {
            adsr: AdsrConfig::default(),
        }
    }

    pub fn with_envelope(adsr: AdsrConfig) -> Self {
        Self { adsr }
    }
}

impl Default for SynthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererBackend for SynthBackend {
    fn open(&self) -> Result<Box<dyn SoundRenderer>, RendererError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(RendererError::NoOutputDevice)?;
        let config: cpal::StreamConfig = device
            .default_output_config()
            .map_err(|e| RendererError::Stream(e.to_string()))?
            .into();

        let num_channels = config.channels as usize;
        let sample_rate = config.sample_rate as f32;
        info!("Audio output: {} channels, {} Hz", num_channels, sample_rate);

        let (producer, mut consumer) = HeapRb::<NoteOn>::new(COMMAND_CAPACITY).split();
        let generation = Arc::new(AtomicU64::new(0));
        let callback_generation = generation.clone();
        let adsr = self.adsr.clone();
        let mut voices: Vec<Voice> = Vec::with_capacity(MAX_VOICES);
        let mut heard = 0;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback(
                        data,
                        num_channels,
                        sample_rate,
                        &adsr,
                        &mut voices,
                        &mut consumer,
                        &callback_generation,
                        &mut heard,
                    );
                },
                |err| error!("Audio error: {}", err),
                None,
            )
            .map_err(|e| RendererError::Stream(e.to_string()))?;
        stream
            .play()
            .map_err(|e| RendererError::Stream(e.to_string()))?;

        Ok(Box::new(SynthRenderer {
            producer,
            generation,
            _stream: stream,
        }))
    }
}

struct SynthRenderer {
    producer: HeapProd<NoteOn>,
    generation: Arc<AtomicU64>,
    _stream: cpal::Stream,
}

impl SoundRenderer for SynthRenderer {
    fn trigger(&mut self, trigger: &Trigger) {
        let note = NoteOn {
            frequency: trigger.pitch.frequency(),
            amplitude: trigger.velocity * db_to_gain(trigger.gain_db),
            duration: trigger.duration as f32,
            generation: self.generation.load(Ordering::Acquire),
        };
        if self.producer.try_push(note).is_err() {
            warn!("voice queue full, dropping {}", trigger.pitch);
        }
    }

    // never queued, so a full queue cannot lose it
    fn silence(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[allow(clippy::too_many_arguments)]
fn audio_callback(
    data: &mut [f32],
    num_channels: usize,
    sample_rate: f32,
    adsr: &AdsrConfig,
    voices: &mut Vec<Voice>,
    consumer: &mut HeapCons<NoteOn>,
    generation: &AtomicU64,
    heard: &mut u64,
) {
    let current = generation.load(Ordering::Acquire);
    if current > *heard {
        voices.clear();
        *heard = current;
    }

    while let Some(note) = consumer.try_pop() {
        if note.generation < *heard {
            continue;
        }
        // silenced after this callback read the counter
        if note.generation > *heard {
            voices.clear();
            *heard = note.generation;
        }
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(Voice::new(note.frequency, note.amplitude, note.duration));
    }

    for frame in data.chunks_mut(num_channels) {
        let sample: f32 = voices
            .iter_mut()
            .map(|v| v.render_sample(adsr, sample_rate))
            .sum();
        frame.fill(sample * HEADROOM);
    }

    voices.retain(|v| !v.is_finished(adsr));
}
