use std::cell::RefCell;
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::rc::Rc;

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use trainer_core::pitch::CaptureStatus;
use trainer_core::scales::ScaleType;
use trainer_core::tuning::interval_frequency;
use trainer_core::{
    AudioClock, CancelToken, DetectionStage, EvaluationPrompter, ExerciseSession, InputStream, IntervalEvaluator,
    ManualClock, MicrophoneSource, Note, PitchCapture, PitchClass, PitchTracker, SessionEvent, Tier, ToneBank,
    TrainerConfig, TrainerError,
};

const SAMPLE_RATE: u32 = 16000;

/// Microphone that hears one queued note per capture; `None` is silence.
#[derive(Clone, Default)]
struct Singer {
    notes: Rc<RefCell<VecDeque<Option<f64>>>>,
}

impl Singer {
    fn sings(&self, notes: &[Option<f64>]) {
        self.notes.borrow_mut().extend(notes.iter().copied());
    }
}

struct SungNote {
    frequency: Option<f64>,
    offset: usize,
}

impl InputStream for SungNote {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn read_latest(&mut self, frame: &mut [f32]) -> bool {
        let start = self.offset;
        for (i, sample) in frame.iter_mut().enumerate() {
            *sample = match self.frequency {
                Some(f) => (0.6 * (TAU * f * (start + i) as f64 / SAMPLE_RATE as f64).sin()) as f32,
                None => 0.0,
            };
        }
        self.offset += frame.len() / 4;
        true
    }
}

impl MicrophoneSource for Singer {
    type Stream = SungNote;

    fn acquire(&mut self) -> Result<SungNote, TrainerError> {
        let frequency = self.notes.borrow_mut().pop_front().flatten();
        Ok(SungNote { frequency, offset: 0 })
    }
}

/// Drives the tracker tick by tick on a manual clock.
struct ManualCapture {
    tracker: PitchTracker<Singer>,
    clock: ManualClock,
}

impl PitchCapture for ManualCapture {
    fn capture(&mut self, duration: f64, cancel: &CancelToken) -> Option<f64> {
        let mut status = self.tracker.begin(duration, self.clock.now(), cancel.clone());
        while status == CaptureStatus::Listening {
            self.clock.advance(0.05);
            status = self.tracker.tick(self.clock.now());
        }
        match status {
            CaptureStatus::Finished(result) => result,
            CaptureStatus::Listening => None,
        }
    }
}

#[derive(Default)]
struct Prompts(Vec<String>);

impl EvaluationPrompter for Prompts {
    fn prompt(&mut self, stage: DetectionStage, capture_secs: f64) {
        self.0.push(format!("play the {stage} note for {capture_secs} s"));
    }
}

fn setup() -> (ExerciseSession<ToneBank>, ToneBank, Singer, ManualCapture, IntervalEvaluator) {
    let config = TrainerConfig {
        inter_capture_pause_secs: 0.0,
        capture_secs: 0.5,
        ..TrainerConfig::default()
    };
    let bank = ToneBank::new(8000);
    let session = ExerciseSession::new(bank.clone(), &config);
    let singer = Singer::default();
    let capture = ManualCapture {
        tracker: PitchTracker::new(singer.clone(), &config),
        clock: ManualClock::new(),
    };
    (session, bank, singer, capture, IntervalEvaluator::from_config(&config))
}

fn render_secs(bank: &ToneBank, secs: f64) {
    let mut out = vec![0.0f32; (secs * bank.sample_rate() as f64) as usize];
    bank.render(&mut out, 1);
}

#[test]
fn interval_exercise_end_to_end() {
    let mut rng = Pcg32::seed_from_u64(2024);
    let (mut session, bank, singer, mut capture, evaluator) = setup();
    session.set_tier(Tier::Easy);

    let exercise = *session.new_interval(&mut rng);
    assert!(session.reference_hint(&mut rng).is_some());
    session.play_interval().unwrap();

    // Drive the host loop off the rendered audio clock.
    let mut started = Vec::new();
    let mut revealed = false;
    while bank.now() < 3.0 {
        for event in session.tick() {
            match event {
                SessionEvent::ToneStarted(tone) => started.push(tone),
                SessionEvent::OptionsRevealed => revealed = true,
            }
        }
        render_secs(&bank, 0.05);
    }
    assert!(revealed);
    assert_eq!(started.len(), 2);
    assert_relative_eq!(started[0].frequency, exercise.base_frequency);
    assert_relative_eq!(started[1].frequency, exercise.second_frequency);
    // Ticks land every 0.05 s but the second note keeps its 1.2 s onset.
    assert_relative_eq!(started[1].start, 1.2, epsilon = 1e-9);
    assert_eq!(bank.active_voices(), 0);

    // The player sings the interval back.
    singer.sings(&[Some(exercise.base_frequency), Some(exercise.second_frequency)]);
    let mut prompts = Prompts::default();
    let result = session
        .evaluate(&evaluator, &mut capture, &mut prompts, &CancelToken::never())
        .unwrap();
    assert!(result.correct, "{result:?}");
    assert_relative_eq!(result.detected_semitones, exercise.interval.semitones as f64, epsilon = 0.2);
    assert_eq!(prompts.0.len(), 2);
    assert_eq!(session.stats().detected.correct, 1);

    // Then answers the multiple-choice question.
    let options = session.multiple_choice_options(&mut rng).unwrap();
    let answer = options
        .iter()
        .find(|o| o.semitones == exercise.interval.semitones)
        .unwrap();
    assert_eq!(session.answer_multiple_choice(answer), Ok(true));
    assert_eq!(session.stats().multiple_choice.correct, 1);
    assert!(session.current().is_none());
}

#[test]
fn wrong_and_missing_notes_are_scored_incorrect() {
    let mut rng = Pcg32::seed_from_u64(11);
    let (mut session, _bank, singer, mut capture, evaluator) = setup();

    let exercise = *session.new_interval(&mut rng);
    // The second note sung below the first.
    let low = interval_frequency(exercise.base_frequency, -5.0);
    singer.sings(&[Some(exercise.base_frequency), Some(low)]);
    let result = session
        .evaluate(&evaluator, &mut capture, &mut Prompts::default(), &CancelToken::never())
        .unwrap();
    assert!(!result.correct);
    assert!(result.detected_semitones < 0.0);

    session.new_interval(&mut rng);
    singer.sings(&[None]);
    let mut prompts = Prompts::default();
    let outcome = session.evaluate(&evaluator, &mut capture, &mut prompts, &CancelToken::never());
    assert_eq!(outcome, Err(TrainerError::DetectionFailed { stage: DetectionStage::First }));
    assert_eq!(prompts.0.len(), 1);

    assert_eq!(session.stats().detected.incorrect, 2);
    assert_eq!(session.stats().detected.correct, 0);
}

#[test]
fn scale_plays_through_the_tone_bank() {
    let (mut session, bank, _singer, _capture, _evaluator) = setup();
    let staff = session
        .play_scale(Note::new(PitchClass::G, 4), ScaleType::Major)
        .unwrap();
    assert_eq!(staff.keys()[7], "G/5");
    assert_eq!(staff.key_signature, "G");

    let mut frequencies = Vec::new();
    while session.is_playing() {
        for event in session.tick() {
            if let SessionEvent::ToneStarted(tone) = event {
                frequencies.push(tone.frequency);
            }
        }
        render_secs(&bank, 0.05);
    }
    assert_eq!(frequencies.len(), 15);
    assert_relative_eq!(frequencies[7], 784.0, epsilon = 1e-9);
    assert_relative_eq!(frequencies[0], frequencies[14], epsilon = 1e-9);
}
