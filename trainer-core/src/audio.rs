//! # Audio Device Module
//!
//! Microphone capture and tone output through CPAL (Cross-Platform Audio
//! Library).
//!
//! ## Features
//! - Automatic device selection with sample-rate negotiation
//! - Input frames streamed from the audio callback over a bounded channel
//! - Microphone released as soon as a capture drops its stream
//! - Output stream rendering the shared [`ToneBank`]

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};
use anyhow::{Result, anyhow};

use crate::error::{TrainerError, TrainerResult};
use crate::pitch::{InputStream, MicrophoneSource};
use crate::synth::ToneBank;

/// Capacity of the callback-to-analysis channel, in callback buffers.
const CHANNEL_CAPACITY: usize = 64;

/// Starts audio capture from the default input device.
///
/// Every callback buffer is downmixed to mono and sent on `sender`; when the
/// channel is full the buffer is dropped rather than blocking the audio
/// thread.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and its sample rate
/// * `Err(e)` - No device or no usable f32 configuration
pub fn start_audio_capture(sender: Sender<Vec<f32>>, target_rate: u32) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    tracing::info!(device = %device.name()?, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();
    let channels = config.channels.max(1) as usize;

    tracing::info!(sample_rate = sample_rate_val, channels, "selected input format");

    let err_fn = |err| tracing::error!("an error occurred on the input stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = if channels == 1 {
                data.to_vec()
            } else {
                data.chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                    .collect()
            };
            // Ignore errors if the channel is full or the capture is gone.
            let _ = sender.try_send(mono);
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Finds the best f32 input configuration for the target sample rate.
///
/// Mono configurations are preferred; among equals the one whose range
/// lies closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (c.channels() != 1, distance)
        })
}

/// The default input device, opened afresh for every capture.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    target_rate: u32,
}

impl CpalMicrophone {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }
}

impl MicrophoneSource for CpalMicrophone {
    type Stream = CpalInputStream;

    fn acquire(&mut self) -> TrainerResult<CpalInputStream> {
        let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let (stream, sample_rate) = start_audio_capture(sender, self.target_rate)
            .map_err(|e| TrainerError::MicrophoneUnavailable(e.to_string()))?;
        Ok(CpalInputStream {
            stream,
            receiver,
            sample_rate,
            history: Vec::new(),
        })
    }
}

/// A running input stream. Dropping it stops the device.
pub struct CpalInputStream {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
    history: Vec<f32>,
}

impl InputStream for CpalInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_latest(&mut self, frame: &mut [f32]) -> bool {
        for chunk in self.receiver.try_iter() {
            self.history.extend_from_slice(&chunk);
        }
        if self.history.len() > frame.len() {
            let excess = self.history.len() - frame.len();
            self.history.drain(..excess);
        }
        if self.history.len() < frame.len() {
            return false;
        }
        frame.copy_from_slice(&self.history);
        true
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("error pausing input stream: {}", e);
        }
        tracing::debug!("microphone released");
    }
}

/// Starts the default output device rendering `bank`.
///
/// The bank adopts the device's sample rate so its clock stays in real
/// time. Keep the returned stream alive for as long as tones should play.
pub fn start_audio_output(bank: ToneBank) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;

    tracing::info!(device = %device.name()?, "using audio output device");

    let supported = device.default_output_config()?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(anyhow!(
            "Unsupported output sample format: {:?}",
            supported.sample_format()
        ));
    }
    let config: cpal::StreamConfig = supported.config();
    let channels = config.channels as usize;
    bank.set_sample_rate(config.sample_rate.0);

    tracing::info!(sample_rate = config.sample_rate.0, channels, "selected output format");

    let err_fn = |err| tracing::error!("an error occurred on the output stream: {}", err);

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            bank.render(data, channels);
        },
        err_fn,
        None,
    )?;

    stream.play()?;
    Ok(stream)
}
