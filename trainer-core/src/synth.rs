//! # Tone Synthesis Module
//!
//! Sine tones with a linear fade in and fade out, mixed polyphonically on a
//! shared audio clock.
//!
//! ## Architecture
//! - `Envelope`: pure gain curve of one tone
//! - `ToneBank`: shared voice list rendered by the output stream callback;
//!   its sample counter is the audio clock everything else schedules against
//! - `ToneSynthesizer`: validates requests and starts tones at "now"

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::AudioClock;
use crate::error::{TrainerError, TrainerResult};

/// Receiver of scheduled tones.
pub trait ToneSink {
    fn start_tone(&self, tone: Tone);
}

/// Linear attack/hold/release gain curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    duration: f64,
    fade: f64,
    peak: f32,
}

impl Envelope {
    /// Creates an envelope. Fades longer than half the tone are shortened
    /// so the ramps never overlap.
    pub fn new(duration: f64, fade: f64, peak: f32) -> Self {
        Self {
            duration,
            fade: fade.clamp(0.0, duration / 2.0),
            peak,
        }
    }

    pub fn fade(&self) -> f64 {
        self.fade
    }

    /// Gain `t` seconds after the tone starts. Zero outside the tone.
    pub fn gain_at(&self, t: f64) -> f32 {
        if t < 0.0 || t >= self.duration {
            return 0.0;
        }
        let level = if self.fade > 0.0 && t < self.fade {
            t / self.fade
        } else if self.fade > 0.0 && t > self.duration - self.fade {
            (self.duration - t) / self.fade
        } else {
            1.0
        };
        self.peak * level as f32
    }
}

/// A tone placed on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f64,
    /// Onset on the audio clock, seconds.
    pub start: f64,
    pub envelope: Envelope,
}

impl Tone {
    pub fn duration(&self) -> f64 {
        self.envelope.duration
    }

    pub fn end(&self) -> f64 {
        self.start + self.envelope.duration
    }

    /// Instantaneous sample value at clock time `t`.
    pub fn sample_at(&self, t: f64) -> f32 {
        let elapsed = t - self.start;
        let gain = self.envelope.gain_at(elapsed);
        if gain == 0.0 {
            return 0.0;
        }
        gain * (TAU * self.frequency * elapsed).sin() as f32
    }
}

#[derive(Debug)]
struct BankState {
    voices: Vec<Tone>,
    frames_rendered: u64,
    sample_rate: u32,
}

/// Polyphonic voice list shared between the scheduler and the output
/// stream. Cloning shares the same voices and clock.
#[derive(Debug, Clone)]
pub struct ToneBank {
    state: Arc<Mutex<BankState>>,
}

impl ToneBank {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BankState {
                voices: Vec::new(),
                frames_rendered: 0,
                sample_rate,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BankState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    /// Adopts the rate the output device actually runs at.
    pub fn set_sample_rate(&self, sample_rate: u32) {
        let mut state = self.lock();
        // Keep the clock continuous across the change.
        let now = state.frames_rendered as f64 / state.sample_rate as f64;
        state.sample_rate = sample_rate;
        state.frames_rendered = (now * sample_rate as f64).round() as u64;
    }

    /// Number of tones not yet finished.
    pub fn active_voices(&self) -> usize {
        self.lock().voices.len()
    }

    /// Mixes all voices into an interleaved buffer and advances the clock.
    ///
    /// Every channel of a frame receives the same mono sample. The mix is
    /// clamped to [-1, 1].
    pub fn render(&self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut state = self.lock();
        let sample_rate = state.sample_rate as f64;
        let first_frame = state.frames_rendered;

        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let t = (first_frame + i as u64) as f64 / sample_rate;
            let mixed: f32 = state.voices.iter().map(|tone| tone.sample_at(t)).sum();
            frame.fill(mixed.clamp(-1.0, 1.0));
        }

        let frames = out.len().div_ceil(channels) as u64;
        state.frames_rendered += frames;
        let now = state.frames_rendered as f64 / sample_rate;
        state.voices.retain(|tone| tone.end() > now);
    }
}

impl AudioClock for ToneBank {
    fn now(&self) -> f64 {
        let state = self.lock();
        state.frames_rendered as f64 / state.sample_rate as f64
    }
}

impl ToneSink for ToneBank {
    fn start_tone(&self, tone: Tone) {
        self.lock().voices.push(tone);
    }
}

/// Plays enveloped sine tones on a sink.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer<S> {
    sink: S,
    fade: f64,
    peak: f32,
}

impl<S: ToneSink + AudioClock> ToneSynthesizer<S> {
    pub fn new(sink: S, fade: f64, peak: f32) -> Self {
        Self { sink, fade, peak }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Starts a tone now.
    ///
    /// # Returns
    /// * `Ok(tone)` - The tone as placed on the clock
    /// * `Err(InvalidTone)` - Frequency or duration not positive and finite
    pub fn play(&self, frequency: f64, duration: f64) -> TrainerResult<Tone> {
        let now = self.sink.now();
        self.play_at(now, frequency, duration)
    }

    /// Starts a tone at an explicit clock time.
    pub fn play_at(&self, start: f64, frequency: f64, duration: f64) -> TrainerResult<Tone> {
        let valid = |x: f64| x.is_finite() && x > 0.0;
        if !valid(frequency) || !valid(duration) {
            return Err(TrainerError::InvalidTone { frequency, duration });
        }
        let tone = Tone {
            frequency,
            start,
            envelope: Envelope::new(duration, self.fade, self.peak),
        };
        tracing::debug!(frequency, duration, start, "starting tone");
        self.sink.start_tone(tone);
        Ok(tone)
    }
}
