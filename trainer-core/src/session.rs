//! # Exercise Session
//!
//! The controller a host drives: it owns the current exercise, the
//! statistics, the playback scheduler and the synthesizer the scheduler
//! plays through.
//!
//! ## Lifecycle
//! 1. `new_interval` draws an exercise for the current tier and arms it
//! 2. `play_interval` schedules the two notes and the options reveal
//! 3. The host calls `tick` from its loop; due tones start on the synth
//! 4. The player answers by `answer_multiple_choice` (consumes the
//!    exercise) or sings it through `evaluate` (disarms it)

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::clock::AudioClock;
use crate::config::TrainerConfig;
use crate::error::{TrainerError, TrainerResult};
use crate::evaluator::{EvaluationPrompter, EvaluationResult, IntervalEvaluator, PitchCapture};
use crate::harmonics::{Progression, ValveCombination, plan_harmonics};
use crate::intervals::{Interval, Tier};
use crate::scales::{ArpeggioType, ScaleType, arpeggio_playback, scale_playback};
use crate::scheduler::{PlaybackAction, PlaybackScheduler, Sequence};
use crate::staff::{StaffSequence, arpeggio_staff, scale_staff, series_staff};
use crate::synth::{Tone, ToneSink, ToneSynthesizer};
use crate::tuning::{KNOWN_NOTES, Note, PitchClass, closest_known_note, interval_frequency};

/// Number of answers offered in multiple-choice mode.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub correct: u32,
    pub incorrect: u32,
}

impl Tally {
    pub fn record(&mut self, correct: bool) {
        if correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
    }

    pub fn attempts(&self) -> u32 {
        self.correct + self.incorrect
    }
}

/// Counters kept for the lifetime of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub multiple_choice: Tally,
    pub detected: Tally,
}

/// One interval question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Exercise {
    pub interval: Interval,
    pub base_frequency: f64,
    pub second_frequency: f64,
    pub base_note: PitchClass,
}

impl Exercise {
    /// Draws an exercise for `tier`.
    pub fn random<R: Rng + ?Sized>(tier: Tier, rng: &mut R) -> Self {
        let intervals = tier.intervals();
        let interval = intervals[rng.gen_range(0..intervals.len())];

        let (base_note, base_frequency) = match tier.base_frequency_range() {
            None => KNOWN_NOTES[rng.gen_range(0..KNOWN_NOTES.len())],
            Some((low, high)) => {
                let frequency = rng.gen_range(low..high);
                (closest_known_note(frequency), frequency)
            }
        };

        Self {
            interval,
            base_frequency,
            second_frequency: interval_frequency(base_frequency, interval.semitones as f64),
            base_note,
        }
    }

    /// Pitch class of the upper note.
    pub fn second_note(&self) -> PitchClass {
        self.base_note.transpose(self.interval.semitones as i32)
    }
}

/// Something the host should react to after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    ToneStarted(Tone),
    /// Time to show the multiple-choice answers.
    OptionsRevealed,
}

/// Playback timings taken from the configuration.
#[derive(Debug, Clone, Copy)]
struct Timings {
    interval_note: f64,
    interval_gap: f64,
    options_delay: f64,
    scale_step: f64,
    scale_note: f64,
    arpeggio_step: f64,
    arpeggio_note: f64,
    harmonics_step: f64,
    harmonics_note: f64,
}

impl From<&TrainerConfig> for Timings {
    fn from(config: &TrainerConfig) -> Self {
        Self {
            interval_note: config.interval_note_secs,
            interval_gap: config.interval_gap_secs,
            options_delay: config.options_delay_secs,
            scale_step: config.scale_step_secs,
            scale_note: config.scale_note_secs,
            arpeggio_step: config.arpeggio_step_secs,
            arpeggio_note: config.arpeggio_note_secs,
            harmonics_step: config.harmonics_step_secs,
            harmonics_note: config.harmonics_note_secs,
        }
    }
}

pub struct ExerciseSession<S> {
    synth: ToneSynthesizer<S>,
    scheduler: PlaybackScheduler,
    timings: Timings,
    tier: Tier,
    current: Option<Exercise>,
    armed: bool,
    stats: SessionStats,
}

impl<S: ToneSink + AudioClock> ExerciseSession<S> {
    pub fn new(sink: S, config: &TrainerConfig) -> Self {
        Self {
            synth: ToneSynthesizer::new(sink, config.fade_secs, config.peak_gain),
            scheduler: PlaybackScheduler::new(),
            timings: Timings::from(config),
            tier: Tier::default(),
            current: None,
            armed: false,
            stats: SessionStats::default(),
        }
    }

    pub fn synth(&self) -> &ToneSynthesizer<S> {
        &self.synth
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Switches tier. The in-progress exercise is dropped, stats are kept.
    pub fn set_tier(&mut self, tier: Tier) {
        if tier != self.tier {
            tracing::info!(%tier, "tier changed");
        }
        self.tier = tier;
        self.current = None;
        self.armed = false;
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn current(&self) -> Option<&Exercise> {
        self.current.as_ref()
    }

    /// True while an exercise can still be sung for scoring.
    pub fn can_evaluate(&self) -> bool {
        self.armed && self.current.is_some()
    }

    /// Replaces the current exercise with a fresh one and arms evaluation.
    pub fn new_interval<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &Exercise {
        let exercise = Exercise::random(self.tier, rng);
        tracing::info!(
            interval = exercise.interval.name,
            base = exercise.base_frequency,
            "new interval exercise"
        );
        self.armed = true;
        self.current.insert(exercise)
    }

    /// Base note name shown to the player, if this tier reveals it.
    ///
    /// Easy always does, medium on a coin flip, hard never.
    pub fn reference_hint<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PitchClass> {
        let exercise = self.current.as_ref()?;
        let shown = match self.tier {
            Tier::Easy => true,
            Tier::Medium => rng.gen_bool(0.5),
            Tier::Hard => false,
        };
        shown.then_some(exercise.base_note)
    }

    /// Base note, then the second note, then the options reveal.
    pub fn interval_sequence(&self, exercise: &Exercise) -> Sequence {
        let t = &self.timings;
        let mut sequence = Sequence::new();
        sequence
            .push_tone(0.0, exercise.base_frequency, t.interval_note)
            .push_tone(t.interval_gap, exercise.second_frequency, t.interval_note)
            .push(t.options_delay, PlaybackAction::RevealOptions);
        sequence
    }

    /// Plays the current exercise, restarting any playback in progress.
    pub fn play_interval(&mut self) -> TrainerResult<()> {
        let exercise = self.current.ok_or(TrainerError::NoActiveExercise)?;
        let sequence = self.interval_sequence(&exercise);
        let now = self.synth.sink().now();
        self.scheduler.start(&sequence, now);
        Ok(())
    }

    /// The correct interval plus three distractors, in random order.
    pub fn multiple_choice_options<R: Rng + ?Sized>(&self, rng: &mut R) -> TrainerResult<Vec<Interval>> {
        let exercise = self.current.as_ref().ok_or(TrainerError::NoActiveExercise)?;
        let correct = exercise.interval;

        let mut options: Vec<Interval> = self
            .tier
            .intervals()
            .iter()
            .copied()
            .filter(|interval| interval.semitones != correct.semitones)
            .collect();
        options.shuffle(rng);
        options.truncate(OPTION_COUNT - 1);
        options.push(correct);
        options.shuffle(rng);
        Ok(options)
    }

    /// Scores a multiple-choice answer and consumes the exercise.
    pub fn answer_multiple_choice(&mut self, answer: &Interval) -> TrainerResult<bool> {
        let exercise = self.current.take().ok_or(TrainerError::NoActiveExercise)?;
        self.armed = false;
        let correct = answer.semitones == exercise.interval.semitones;
        self.stats.multiple_choice.record(correct);
        tracing::info!(
            answer = answer.name,
            expected = exercise.interval.name,
            correct,
            "multiple-choice answer"
        );
        Ok(correct)
    }

    /// Sings the current exercise through `evaluator`.
    ///
    /// Evaluation is disarmed after the attempt whatever its outcome, but
    /// the exercise stays current for playback and multiple choice. A
    /// detection failure is scored as incorrect; a cancelled attempt is
    /// not scored.
    pub fn evaluate<P, U>(
        &mut self,
        evaluator: &IntervalEvaluator,
        capture: &mut P,
        prompter: &mut U,
        cancel: &CancelToken,
    ) -> TrainerResult<EvaluationResult>
    where
        P: PitchCapture,
        U: EvaluationPrompter,
    {
        if !self.can_evaluate() {
            return Err(TrainerError::NoActiveExercise);
        }
        let expected = self
            .current
            .as_ref()
            .map(|exercise| exercise.interval.semitones)
            .ok_or(TrainerError::NoActiveExercise)?;
        self.armed = false;

        let outcome = evaluator.evaluate_two_note_interval(expected, capture, prompter, cancel);
        match &outcome {
            Ok(result) => self.stats.detected.record(result.correct),
            Err(TrainerError::DetectionFailed { stage }) => {
                tracing::warn!(%stage, "no pitch detected");
                self.stats.detected.record(false);
            }
            Err(e) => tracing::warn!("evaluation aborted: {}", e),
        }
        outcome
    }

    /// Plays a scale up and down from `root`.
    ///
    /// Returns the staff to draw, or `None` when a sequence is already
    /// playing and the request was ignored.
    pub fn play_scale(&mut self, root: Note, scale_type: ScaleType) -> Option<StaffSequence> {
        let spec = scale_type.spec();
        let frequencies = scale_playback(root.frequency(), &spec);
        let sequence = Sequence::evenly_spaced(&frequencies, self.timings.scale_step, self.timings.scale_note);
        self.start_guarded(&sequence)
            .then(|| scale_staff(root, &spec))
    }

    /// Plays an arpeggio up and down from `root`.
    pub fn play_arpeggio(&mut self, root: Note, arpeggio_type: ArpeggioType) -> Option<StaffSequence> {
        let spec = arpeggio_type.spec();
        let frequencies = arpeggio_playback(root.frequency(), &spec);
        let sequence = Sequence::evenly_spaced(&frequencies, self.timings.arpeggio_step, self.timings.arpeggio_note);
        self.start_guarded(&sequence)
            .then(|| arpeggio_staff(root, &spec))
    }

    /// Plays the harmonic series of `start`, continuing through further
    /// fingerings when `progression` asks for it. The number of harmonics
    /// follows the current tier.
    pub fn play_harmonics(&mut self, start: ValveCombination, progression: Progression) -> Option<StaffSequence> {
        let plan = plan_harmonics(start, self.tier, progression);
        let sequence = Sequence::evenly_spaced(&plan.playback, self.timings.harmonics_step, self.timings.harmonics_note);
        self.start_guarded(&sequence)
            .then(|| series_staff(&plan.display))
    }

    fn start_guarded(&mut self, sequence: &Sequence) -> bool {
        let now = self.synth.sink().now();
        if self.scheduler.is_playing(now) {
            tracing::debug!("playback already running, request ignored");
            return false;
        }
        self.scheduler.start(sequence, now);
        true
    }

    /// Stops all pending playback. Tones already sounding finish.
    pub fn stop(&mut self) -> usize {
        self.scheduler.cancel_all()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing(self.synth.sink().now())
    }

    /// Fires every action that has come due. Call from the host loop.
    ///
    /// Tones start at their scheduled onset, so a late tick does not
    /// stretch the gap between notes.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let now = self.synth.sink().now();
        let mut events = Vec::new();
        for (at, action) in self.scheduler.poll(now) {
            match action {
                PlaybackAction::Tone { frequency, duration } => match self.synth.play_at(at, frequency, duration) {
                    Ok(tone) => events.push(SessionEvent::ToneStarted(tone)),
                    Err(e) => tracing::warn!("skipping tone: {}", e),
                },
                PlaybackAction::RevealOptions => events.push(SessionEvent::OptionsRevealed),
            }
        }
        events
    }
}
