//! # Trainer Configuration
//!
//! Timing, detection and synthesis parameters for the trainer. Every field
//! has a default matching the behaviour of the original practice widget, so
//! a partial JSON file only needs to name what it changes.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TrainerError, TrainerResult};

/// How the per-tick pitch estimates of one capture are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchAggregation {
    /// Arithmetic mean of all valid estimates
    #[default]
    Mean,
    /// Median, less sensitive to octave slips
    Median,
}

/// How the autocorrelation sequence is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocorrelationStrategy {
    /// Nested-loop sum, O(n^2)
    Direct,
    /// Zero-padded FFT power spectrum, O(n log n)
    #[default]
    Fft,
}

/// Complete trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    // --- Synthesis ---
    /// Length of the linear fade in and fade out, seconds.
    pub fade_secs: f64,
    /// Peak amplitude of a single tone.
    pub peak_gain: f32,
    /// Preferred output/input sample rate in Hz.
    pub sample_rate: u32,

    // --- Pitch detection ---
    /// Samples analysed per tick.
    pub frame_size: usize,
    /// RMS below which a frame counts as silence.
    pub rms_threshold: f32,
    /// Amplitude deadband used to trim frame edges.
    pub trim_deadband: f32,
    pub aggregation: PitchAggregation,
    pub autocorrelation: AutocorrelationStrategy,

    // --- Evaluation ---
    /// Length of each of the two captures, seconds.
    pub capture_secs: f64,
    /// Pause between the two captures, seconds.
    pub inter_capture_pause_secs: f64,
    /// Allowed error in semitones.
    pub tolerance_semitones: f64,

    // --- Playback timing ---
    pub interval_note_secs: f64,
    /// Delay before the second note of an interval.
    pub interval_gap_secs: f64,
    /// Delay before the multiple-choice options are shown.
    pub options_delay_secs: f64,
    pub scale_step_secs: f64,
    pub scale_note_secs: f64,
    pub arpeggio_step_secs: f64,
    pub arpeggio_note_secs: f64,
    pub harmonics_step_secs: f64,
    pub harmonics_note_secs: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            fade_secs: 0.01,
            peak_gain: 1.0,
            sample_rate: 44100,
            frame_size: 2048,
            rms_threshold: 0.01,
            trim_deadband: 0.2,
            aggregation: PitchAggregation::Mean,
            autocorrelation: AutocorrelationStrategy::Fft,
            capture_secs: 3.0,
            inter_capture_pause_secs: 0.5,
            tolerance_semitones: 0.5,
            interval_note_secs: 1.0,
            interval_gap_secs: 1.2,
            options_delay_secs: 2.5,
            scale_step_secs: 0.9,
            scale_note_secs: 0.8,
            arpeggio_step_secs: 1.0,
            arpeggio_note_secs: 0.8,
            harmonics_step_secs: 1.0,
            harmonics_note_secs: 0.8,
        }
    }
}

impl TrainerConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> TrainerResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| TrainerError::Config(format!("{}: {}", path.display(), e)))?;
        let mut data = String::new();
        file.read_to_string(&mut data)
            .map_err(|e| TrainerError::Config(format!("{}: {}", path.display(), e)))?;
        let config: TrainerConfig = serde_json::from_str(&data)
            .map_err(|e| TrainerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded trainer configuration");
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> TrainerResult<()> {
        let path = path.as_ref();
        let json_string =
            serde_json::to_string_pretty(self).map_err(|e| TrainerError::Config(e.to_string()))?;
        let mut file = File::create(path)
            .map_err(|e| TrainerError::Config(format!("{}: {}", path.display(), e)))?;
        file.write_all(json_string.as_bytes())
            .map_err(|e| TrainerError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Rejects values the trainer cannot work with.
    pub fn validate(&self) -> TrainerResult<()> {
        if self.frame_size < 4 {
            return Err(TrainerError::Config(format!(
                "frame_size must be at least 4, got {}",
                self.frame_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(TrainerError::Config("sample_rate must be positive".into()));
        }
        if !(self.capture_secs > 0.0) {
            return Err(TrainerError::Config("capture_secs must be positive".into()));
        }
        if !(self.tolerance_semitones >= 0.0) {
            return Err(TrainerError::Config(
                "tolerance_semitones must not be negative".into(),
            ));
        }
        if !(self.fade_secs >= 0.0) {
            return Err(TrainerError::Config("fade_secs must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TrainerConfig =
            serde_json::from_str(r#"{ "tolerance_semitones": 0.25, "aggregation": "median" }"#)
                .unwrap();
        assert_eq!(config.tolerance_semitones, 0.25);
        assert_eq!(config.aggregation, PitchAggregation::Median);
        assert_eq!(config.capture_secs, 3.0);
        assert_eq!(config.frame_size, 2048);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("trainer-config-{}.json", std::process::id()));
        let mut config = TrainerConfig::default();
        config.interval_gap_secs = 2.0;
        config.save(&path).unwrap();
        let loaded = TrainerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn rejects_zero_capture() {
        let config = TrainerConfig {
            capture_secs: 0.0,
            ..TrainerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrainerError::Config(_))));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = TrainerConfig::load("/nonexistent/trainer.json").unwrap_err();
        assert!(matches!(err, TrainerError::Config(_)));
    }
}
