//! Error types shared by the trainer core.

use std::fmt;

use thiserror::Error;

/// Result type for trainer operations.
pub type TrainerResult<T> = Result<T, TrainerError>;

/// Which of the two captures in an interval evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStage {
    First,
    Second,
}

impl fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionStage::First => write!(f, "first"),
            DetectionStage::Second => write!(f, "second"),
        }
    }
}

/// Everything that can go wrong in the trainer.
///
/// None of these are fatal. Capture failures are converted to "no pitch"
/// at the tracker boundary and the rest are reported as status text by the
/// host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainerError {
    /// The input device could not be opened.
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// Every tick of a capture was below the energy threshold.
    #[error("no pitch detected")]
    NoPitchDetected,

    /// The capture was cancelled before its duration elapsed.
    #[error("capture cancelled")]
    CaptureCancelled,

    /// One of the two evaluation captures produced no pitch.
    #[error("could not detect the {stage} note")]
    DetectionFailed {
        /// The capture that failed.
        stage: DetectionStage,
    },

    /// Evaluation or answer requested with no current exercise.
    #[error("no interval has been generated to compare against")]
    NoActiveExercise,

    /// Tone parameters outside the playable range.
    #[error("invalid tone: {frequency} Hz for {duration} s")]
    InvalidTone {
        /// Requested frequency.
        frequency: f64,
        /// Requested duration.
        duration: f64,
    },

    /// A note name outside the sharp-spelled chromatic alphabet.
    #[error("unknown note name: {0}")]
    UnknownNote(String),

    /// Invalid option value coming from the host.
    #[error("unknown {kind}: {value}")]
    UnknownOption {
        /// What was being parsed ("tier", "scale type", ...).
        kind: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Configuration could not be read or written.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrainerError {
    pub(crate) fn unknown_option(kind: &'static str, value: &str) -> Self {
        TrainerError::UnknownOption {
            kind,
            value: value.to_string(),
        }
    }
}
