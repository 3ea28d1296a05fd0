//! # Interval Evaluation Module
//!
//! Listens for two notes in turn and compares the interval between them
//! with the expected one.
//!
//! The detected interval is signed: a performer who sings downwards where
//! an ascending interval was expected gets a negative value and is scored
//! as incorrect.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, select};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::clock::AudioClock;
use crate::config::TrainerConfig;
use crate::error::{DetectionStage, TrainerError, TrainerResult};
use crate::pitch::{MicrophoneSource, PitchTracker};

/// Outcome of one evaluated attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub correct: bool,
    pub detected_semitones: f64,
    pub expected_semitones: f64,
    pub first_pitch: f64,
    pub second_pitch: f64,
}

/// Signed interval from `first` to `second` in semitones.
pub fn detected_interval(first: f64, second: f64) -> f64 {
    12.0 * (second / first).log2()
}

/// Scores a pair of detected pitches against an expected interval.
pub fn compare_interval(first: f64, second: f64, expected_semitones: f64, tolerance: f64) -> EvaluationResult {
    let detected_semitones = detected_interval(first, second);
    EvaluationResult {
        correct: (detected_semitones - expected_semitones).abs() <= tolerance,
        detected_semitones,
        expected_semitones,
        first_pitch: first,
        second_pitch: second,
    }
}

/// UI collaborator told what the performer should do next.
pub trait EvaluationPrompter {
    /// Ask the performer to play the note for `stage`.
    fn prompt(&mut self, stage: DetectionStage, capture_secs: f64);

    /// A note was detected.
    fn detected(&mut self, _stage: DetectionStage, _pitch: f64) {}
}

/// Anything that can listen for one note.
pub trait PitchCapture {
    fn capture(&mut self, duration: f64, cancel: &CancelToken) -> Option<f64>;
}

/// Live microphone capture paced by a tick channel.
pub struct LiveCapture<'a, M: MicrophoneSource, C: AudioClock> {
    tracker: &'a mut PitchTracker<M>,
    clock: &'a C,
    ticker: Receiver<Instant>,
}

impl<'a, M: MicrophoneSource, C: AudioClock> LiveCapture<'a, M, C> {
    pub fn new(tracker: &'a mut PitchTracker<M>, clock: &'a C, tick_interval: Duration) -> Self {
        Self {
            tracker,
            clock,
            ticker: crossbeam_channel::tick(tick_interval),
        }
    }
}

impl<M: MicrophoneSource, C: AudioClock> PitchCapture for LiveCapture<'_, M, C> {
    fn capture(&mut self, duration: f64, cancel: &CancelToken) -> Option<f64> {
        self.tracker
            .capture_blocking(duration, self.clock, &self.ticker, cancel)
    }
}

/// Two-stage interval evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalEvaluator {
    pub capture_secs: f64,
    pub pause_secs: f64,
    pub tolerance: f64,
}

impl Default for IntervalEvaluator {
    fn default() -> Self {
        Self::from_config(&TrainerConfig::default())
    }
}

impl IntervalEvaluator {
    pub fn from_config(config: &TrainerConfig) -> Self {
        Self {
            capture_secs: config.capture_secs,
            pause_secs: config.inter_capture_pause_secs,
            tolerance: config.tolerance_semitones,
        }
    }

    /// Captures two notes and scores the interval between them.
    ///
    /// # Returns
    /// * `Ok(result)` - Both notes detected, scored against `expected_semitones`
    /// * `Err(DetectionFailed)` - The first or second capture found no pitch
    /// * `Err(CaptureCancelled)` - `cancel` fired during the attempt
    pub fn evaluate_two_note_interval<P, U>(
        &self,
        expected_semitones: u8,
        capture: &mut P,
        prompter: &mut U,
        cancel: &CancelToken,
    ) -> TrainerResult<EvaluationResult>
    where
        P: PitchCapture,
        U: EvaluationPrompter,
    {
        let first = self.capture_stage(DetectionStage::First, capture, prompter, cancel)?;

        if self.pause_secs > 0.0 {
            select! {
                recv(cancel.receiver()) -> _ => return Err(TrainerError::CaptureCancelled),
                default(Duration::from_secs_f64(self.pause_secs)) => {}
            }
        }

        let second = self.capture_stage(DetectionStage::Second, capture, prompter, cancel)?;

        let result = compare_interval(first, second, expected_semitones as f64, self.tolerance);
        tracing::info!(
            expected = expected_semitones,
            detected = result.detected_semitones,
            correct = result.correct,
            "interval evaluated"
        );
        Ok(result)
    }

    fn capture_stage<P, U>(
        &self,
        stage: DetectionStage,
        capture: &mut P,
        prompter: &mut U,
        cancel: &CancelToken,
    ) -> TrainerResult<f64>
    where
        P: PitchCapture,
        U: EvaluationPrompter,
    {
        prompter.prompt(stage, self.capture_secs);
        match capture.capture(self.capture_secs, cancel) {
            Some(pitch) => {
                prompter.detected(stage, pitch);
                Ok(pitch)
            }
            None if cancel.is_cancelled() => Err(TrainerError::CaptureCancelled),
            None => Err(TrainerError::DetectionFailed { stage }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::tuning::interval_frequency;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Option<f64>>);

    impl PitchCapture for Scripted {
        fn capture(&mut self, _duration: f64, _cancel: &CancelToken) -> Option<f64> {
            self.0.pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct Log(Vec<DetectionStage>);

    impl EvaluationPrompter for Log {
        fn prompt(&mut self, stage: DetectionStage, _capture_secs: f64) {
            self.0.push(stage);
        }
    }

    fn evaluator() -> IntervalEvaluator {
        IntervalEvaluator {
            pause_secs: 0.0,
            ..IntervalEvaluator::default()
        }
    }

    #[test]
    fn perfect_fifth_is_correct() {
        let result = compare_interval(440.0, interval_frequency(440.0, 7.0), 7.0, 0.5);
        assert!(result.correct);
        assert_relative_eq!(result.detected_semitones, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn unison_against_fifth_is_incorrect() {
        let result = compare_interval(440.0, 440.0, 7.0, 0.5);
        assert!(!result.correct);
        assert_relative_eq!(result.detected_semitones, 0.0);
    }

    #[test]
    fn tolerance_boundary() {
        let slightly_flat = interval_frequency(440.0, 6.6);
        assert!(compare_interval(440.0, slightly_flat, 7.0, 0.5).correct);
        let too_flat = interval_frequency(440.0, 6.4);
        assert!(!compare_interval(440.0, too_flat, 7.0, 0.5).correct);
    }

    #[test]
    fn descending_performance_scores_incorrect() {
        let below = interval_frequency(440.0, -7.0);
        let result = compare_interval(440.0, below, 7.0, 0.5);
        assert!(!result.correct);
        assert!(result.detected_semitones < 0.0);
    }

    #[test]
    fn two_stage_success() {
        let mut capture = Scripted(VecDeque::from([Some(261.63), Some(interval_frequency(261.63, 4.0))]));
        let mut log = Log::default();
        let result = evaluator()
            .evaluate_two_note_interval(4, &mut capture, &mut log, &CancelToken::never())
            .unwrap();
        assert!(result.correct);
        assert_eq!(result.expected_semitones, 4.0);
        assert_eq!(log.0, vec![DetectionStage::First, DetectionStage::Second]);
    }

    #[test]
    fn first_stage_failure() {
        let mut capture = Scripted(VecDeque::from([None, Some(440.0)]));
        let mut log = Log::default();
        let err = evaluator()
            .evaluate_two_note_interval(7, &mut capture, &mut log, &CancelToken::never())
            .unwrap_err();
        assert_eq!(err, TrainerError::DetectionFailed { stage: DetectionStage::First });
        // Never prompted for the second note.
        assert_eq!(log.0, vec![DetectionStage::First]);
    }

    #[test]
    fn second_stage_failure() {
        let mut capture = Scripted(VecDeque::from([Some(440.0), None]));
        let err = evaluator()
            .evaluate_two_note_interval(7, &mut capture, &mut Log::default(), &CancelToken::never())
            .unwrap_err();
        assert_eq!(err, TrainerError::DetectionFailed { stage: DetectionStage::Second });
    }

    #[test]
    fn cancel_during_pause() {
        let (mut handle, token) = cancel_pair();
        handle.cancel();
        let evaluator = IntervalEvaluator {
            pause_secs: 10.0,
            ..IntervalEvaluator::default()
        };
        let mut capture = Scripted(VecDeque::from([Some(440.0), Some(660.0)]));
        let err = evaluator
            .evaluate_two_note_interval(7, &mut capture, &mut Log::default(), &token)
            .unwrap_err();
        assert_eq!(err, TrainerError::CaptureCancelled);
    }

    #[test]
    fn cancelled_capture_is_not_a_detection_failure() {
        let (mut handle, token) = cancel_pair();
        handle.cancel();
        let mut capture = Scripted(VecDeque::from([None]));
        let err = evaluator()
            .evaluate_two_note_interval(7, &mut capture, &mut Log::default(), &token)
            .unwrap_err();
        assert_eq!(err, TrainerError::CaptureCancelled);
    }
}
