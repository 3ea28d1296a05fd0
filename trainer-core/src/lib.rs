// trainer-core/src/lib.rs

//! The core logic for the horn ear trainer.
//! This crate is responsible for tone synthesis, music-theory generation,
//! pitch detection and interval evaluation. It is completely headless
//! and contains no terminal or GUI code.

pub mod audio;
pub mod cancel;
pub mod capture_processing;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fft;
pub mod harmonics;
pub mod intervals;
pub mod pitch;
pub mod scales;
pub mod scheduler;
pub mod session;
pub mod staff;
pub mod synth;
pub mod tuning;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use clock::{AudioClock, ManualClock};
pub use config::TrainerConfig;
pub use error::{DetectionStage, TrainerError, TrainerResult};
pub use evaluator::{EvaluationPrompter, EvaluationResult, IntervalEvaluator, LiveCapture, PitchCapture};
pub use intervals::{Interval, Tier};
pub use pitch::{InputStream, MicrophoneSource, PitchTracker};
pub use session::{Exercise, ExerciseSession, SessionEvent, SessionStats};
pub use staff::StaffSequence;
pub use synth::{ToneBank, ToneSink, ToneSynthesizer};
pub use tuning::{Note, PitchClass};
