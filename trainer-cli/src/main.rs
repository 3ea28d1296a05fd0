//! # Horn Trainer - Terminal Ear Trainer
//!
//! Plays intervals, scales, arpeggios and harmonic series through the
//! default output device and, on request, listens to the player singing an
//! interval back through the default input device.
//!
//! ## Architecture
//! - **Main Thread**: tick loop driving the exercise session
//! - **Audio Threads**: cpal callbacks rendering the tone bank and feeding
//!   microphone frames
//! - **Stdin Thread**: forwards typed lines over a crossbeam channel

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, select};
use rand::SeedableRng;
use rand::rngs::StdRng;

use trainer_core::audio::{self, CpalMicrophone};
use trainer_core::harmonics::{Progression, ValveCombination, progression_combinations};
use trainer_core::scales::{ArpeggioType, ScaleType};
use trainer_core::tuning::{calculate_cents_deviation, frequency_to_note};
use trainer_core::{
    CancelToken, DetectionStage, EvaluationPrompter, Exercise, ExerciseSession, IntervalEvaluator, LiveCapture, Note,
    PitchTracker, SessionEvent, StaffSequence, Tier, ToneBank, TrainerConfig,
};

/// Host loop period, roughly one display frame.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Horn Trainer - ear training for brass players
#[derive(Parser)]
#[command(name = "horn-trainer")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Difficulty tier: easy, medium or hard
    #[arg(long, global = true, default_value = "medium")]
    tier: Tier,

    /// Seed for reproducible exercises
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify random intervals by ear
    Interval {
        /// Number of exercises
        #[arg(long, default_value_t = 5)]
        rounds: u32,

        /// Also sing each interval back into the microphone
        #[arg(long)]
        sing: bool,
    },

    /// Play a scale up and down
    Scale {
        /// Root note, e.g. C/4 or F#
        root: Note,
        #[arg(default_value = "major")]
        scale_type: ScaleType,
    },

    /// Play an arpeggio up and down
    Arpeggio {
        root: Note,
        #[arg(default_value = "major")]
        arpeggio_type: ArpeggioType,
    },

    /// Play the harmonic series of a valve combination
    Harmonics {
        /// Fingering: 0, 1, 2, 3, 1-2, 2-3, 1-3 or 1-2-3
        #[arg(default_value = "0")]
        valves: ValveCombination,

        /// Continue through further fingerings: none, up or down
        #[arg(long, default_value = "none")]
        progression: Progression,
    },

    /// Write the effective configuration to a JSON file
    Config { path: PathBuf },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrainerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => TrainerConfig::default(),
    };

    if let Commands::Config { path } = &cli.command {
        config.save(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let bank = ToneBank::new(config.sample_rate);
    let output = audio::start_audio_output(bank.clone()).context("opening audio output")?;

    let mut session = ExerciseSession::new(bank.clone(), &config);
    session.set_tier(cli.tier);

    let ticker = crossbeam_channel::tick(TICK_INTERVAL);
    let lines = spawn_stdin_reader();

    match cli.command {
        Commands::Interval { rounds, sing } => {
            let mut rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut tracker = PitchTracker::new(CpalMicrophone::new(config.sample_rate), &config);
            let evaluator = IntervalEvaluator::from_config(&config);

            for round in 1..=rounds {
                println!("\n--- Interval {round}/{rounds} ({}) ---", session.tier());
                session.new_interval(&mut rng);
                if let Some(note) = session.reference_hint(&mut rng) {
                    println!("Reference note: {note}");
                }
                session.play_interval()?;
                drive_playback(&mut session, &ticker, &lines);

                if sing {
                    let exercise = session.current().copied();
                    let mut capture = LiveCapture::new(&mut tracker, &bank, TICK_INTERVAL);
                    match session.evaluate(&evaluator, &mut capture, &mut StdoutPrompter, &CancelToken::never()) {
                        Ok(result) => {
                            println!(
                                "You sang {:+.2} semitones (expected {}): {}",
                                result.detected_semitones,
                                result.expected_semitones,
                                if result.correct { "correct" } else { "incorrect" }
                            );
                            if let Some(exercise) = exercise {
                                print_notes(&exercise);
                            }
                        }
                        Err(e) => println!("{e}"),
                    }
                }

                if !ask_multiple_choice(&mut session, &mut rng, &ticker, &lines)? {
                    break;
                }
            }
            print_stats(&session);
        }
        Commands::Scale { root, scale_type } => {
            println!("{scale_type} scale from {root}");
            if let Some(staff) = session.play_scale(root, scale_type) {
                print_staff(&staff);
            }
            drive_playback(&mut session, &ticker, &lines);
        }
        Commands::Arpeggio { root, arpeggio_type } => {
            println!("{arpeggio_type} arpeggio from {root}");
            if let Some(staff) = session.play_arpeggio(root, arpeggio_type) {
                print_staff(&staff);
            }
            drive_playback(&mut session, &ticker, &lines);
        }
        Commands::Harmonics { valves, progression } => {
            let fingerings: Vec<&str> = progression_combinations(valves, progression)
                .into_iter()
                .map(ValveCombination::label)
                .collect();
            println!("Harmonics ({}) for valves {}", session.tier(), fingerings.join(" → "));
            if let Some(staff) = session.play_harmonics(valves, progression) {
                print_staff(&staff);
            }
            drive_playback(&mut session, &ticker, &lines);
        }
        Commands::Config { .. } => {}
    }

    // Let the last tone ring out before closing the device.
    while bank.active_voices() > 0 {
        ticker.recv()?;
    }
    output.pause()?;
    Ok(())
}

/// Forwards stdin lines to the main thread.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Ticks the session until its sequence ends or the user types `s`.
fn drive_playback(session: &mut ExerciseSession<ToneBank>, ticker: &Receiver<Instant>, lines: &Receiver<String>) {
    let mut stdin_open = true;
    loop {
        let input = if stdin_open { lines.clone() } else { crossbeam_channel::never() };
        select! {
            recv(ticker) -> _ => {
                for event in session.tick() {
                    match event {
                        SessionEvent::ToneStarted(tone) => {
                            tracing::debug!(frequency = tone.frequency, note = %frequency_to_note(tone.frequency), "tone")
                        }
                        SessionEvent::OptionsRevealed => tracing::debug!("options revealed"),
                    }
                }
                if !session.is_playing() {
                    return;
                }
            }
            recv(input) -> line => {
                match line {
                    Ok(line) if line.trim() == "s" => {
                        session.stop();
                        return;
                    }
                    Ok(_) => {}
                    Err(_) => stdin_open = false,
                }
            }
        }
    }
}

/// Shows the options and scores the typed answer.
///
/// `r` replays the interval. Returns `false` once stdin is closed or the
/// user types `q`.
fn ask_multiple_choice(
    session: &mut ExerciseSession<ToneBank>,
    rng: &mut StdRng,
    ticker: &Receiver<Instant>,
    lines: &Receiver<String>,
) -> Result<bool> {
    let options = session.multiple_choice_options(rng)?;
    loop {
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }
        print!("Your answer (1-{}, r = replay, q = quit): ", options.len());
        io::stdout().flush()?;

        let Ok(line) = lines.recv() else {
            return Ok(false);
        };
        match line.trim() {
            "q" => return Ok(false),
            "r" => {
                session.play_interval()?;
                drive_playback(session, ticker, lines);
            }
            choice => {
                let Some(answer) = choice
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| options.get(i))
                else {
                    println!("Please enter a number between 1 and {}.", options.len());
                    continue;
                };
                let exercise = session.current().copied();
                if session.answer_multiple_choice(answer)? {
                    println!("Correct!");
                } else if let Some(exercise) = &exercise {
                    println!("Incorrect, it was a {}.", exercise.interval);
                }
                if let Some(exercise) = &exercise {
                    print_notes(exercise);
                }
                return Ok(true);
            }
        }
    }
}

fn print_notes(exercise: &Exercise) {
    println!("Base: {}, Second: {}", exercise.base_note, exercise.second_note());
}

fn print_staff(staff: &StaffSequence) {
    println!("Key: {}", staff.key_signature);
    println!("Notes: {}", staff.keys().join(" "));
}

fn print_stats(session: &ExerciseSession<ToneBank>) {
    let stats = session.stats();
    println!("\nMultiple choice: {} correct, {} incorrect", stats.multiple_choice.correct, stats.multiple_choice.incorrect);
    if stats.detected.attempts() > 0 {
        println!("Sung: {} correct, {} incorrect", stats.detected.correct, stats.detected.incorrect);
    }
}

/// Prompts the player on stdout.
struct StdoutPrompter;

impl EvaluationPrompter for StdoutPrompter {
    fn prompt(&mut self, stage: DetectionStage, capture_secs: f64) {
        println!("Play the {stage} note now ({capture_secs} s)...");
    }

    fn detected(&mut self, stage: DetectionStage, pitch: f64) {
        let note = frequency_to_note(pitch);
        let cents = calculate_cents_deviation(pitch, note.frequency());
        println!("Heard the {stage} note as {note} ({pitch:.1} Hz, {cents:+.0} cents)");
    }
}
