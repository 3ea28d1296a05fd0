//! # Musical Tuning Module
//!
//! Note naming and equal-temperament frequency arithmetic for the trainer.
//!
//! ## Features
//! - Twelve sharp-spelled pitch classes with modulo-12 transposition
//! - Equal temperament interval calculations
//! - Nearest-note naming of arbitrary frequencies (pitch class + octave)
//! - Lookup in the octave-4 reference table used to label exercises
//! - Cent deviation calculations for status display

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::TrainerError;

/// Middle C as used for nearest-note naming.
pub const MIDDLE_C_HZ: f64 = 261.63;

/// Octave number of the reference table and of middle C.
pub const REFERENCE_OCTAVE: i32 = 4;

/// One of the twelve chromatic pitch classes, always spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order starting from C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Position in the chromatic alphabet (C = 0).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class at `index` modulo 12. Negative indices wrap downwards.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Canonical name, e.g. `"C#"`.
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    pub fn is_sharp(self) -> bool {
        self.name().ends_with('#')
    }

    /// Moves the pitch class by `semitones`, wrapping within the octave.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_index(self.index() as i32 + semitones)
    }

    /// Frequency of this pitch class in the octave-4 reference table.
    pub fn reference_frequency(self) -> f64 {
        KNOWN_NOTES[self.index()].1
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static map for note name to pitch class lookups.
static NOTE_MAP: Lazy<BTreeMap<&'static str, PitchClass>> = Lazy::new(|| {
    PitchClass::ALL
        .iter()
        .map(|&pc| (pc.name(), pc))
        .collect()
});

impl FromStr for PitchClass {
    type Err = TrainerError;

    /// Parses a sharp-spelled name. An octave suffix such as `"C#/4"` is
    /// accepted and ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.split('/').next().unwrap_or(s).trim();
        NOTE_MAP
            .get(name)
            .copied()
            .ok_or_else(|| TrainerError::UnknownNote(s.to_string()))
    }
}

/// Reference pitches for octave 4, as shown to the player.
pub const KNOWN_NOTES: [(PitchClass, f64); 12] = [
    (PitchClass::C, 261.63),
    (PitchClass::CSharp, 277.18),
    (PitchClass::D, 293.66),
    (PitchClass::DSharp, 311.13),
    (PitchClass::E, 329.63),
    (PitchClass::F, 349.23),
    (PitchClass::FSharp, 369.99),
    (PitchClass::G, 392.00),
    (PitchClass::GSharp, 415.30),
    (PitchClass::A, 440.00),
    (PitchClass::ASharp, 466.16),
    (PitchClass::B, 493.88),
];

/// A pitch class placed in a specific octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Moves the note by `semitones`, carrying into neighbouring octaves.
    pub fn transpose(self, semitones: i32) -> Self {
        let absolute = self.pitch_class.index() as i32 + semitones;
        Self {
            pitch_class: PitchClass::from_index(absolute),
            octave: self.octave + absolute.div_euclid(12),
        }
    }

    /// Frequency from the reference table, shifted by whole octaves.
    pub fn frequency(self) -> f64 {
        self.pitch_class.reference_frequency() * 2.0_f64.powi(self.octave - REFERENCE_OCTAVE)
    }
}

impl fmt::Display for Note {
    /// Formats as the staff key, e.g. `"C#/4"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = TrainerError;

    /// Parses `"C#/4"` or a bare `"C#"`, which defaults to octave 4.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '/');
        let pitch_class: PitchClass = parts.next().unwrap_or_default().parse()?;
        let octave = match parts.next() {
            Some(octave) => octave
                .trim()
                .parse()
                .map_err(|_| TrainerError::UnknownNote(s.to_string()))?,
            None => REFERENCE_OCTAVE,
        };
        Ok(Self { pitch_class, octave })
    }
}

/// Frequency `semitones` away from `base` in equal temperament.
///
/// Negative semitones descend.
pub fn interval_frequency(base: f64, semitones: f64) -> f64 {
    base * 2.0_f64.powf(semitones / 12.0)
}

/// Maps a frequency to the nearest chromatic note, measured from middle C.
///
/// This is a nearest-note mapping with no cents precision, used for display
/// and staff input, never for scoring.
pub fn frequency_to_note(freq: f64) -> Note {
    let semitones = (12.0 * (freq / MIDDLE_C_HZ).log2()).round() as i32;
    Note {
        pitch_class: PitchClass::from_index(semitones),
        octave: REFERENCE_OCTAVE + semitones.div_euclid(12),
    }
}

/// Finds the reference-table note closest to `freq` by absolute Hz distance.
pub fn closest_known_note(freq: f64) -> PitchClass {
    KNOWN_NOTES
        .iter()
        .min_by(|a, b| {
            let diff_a = (a.1 - freq).abs();
            let diff_b = (b.1 - freq).abs();
            diff_a.total_cmp(&diff_b)
        })
        .map(|&(pc, _)| pc)
        .unwrap_or(PitchClass::C) // KNOWN_NOTES is never empty
}

/// Names the note `semitones` above `base_name`.
///
/// # Returns
/// * `Ok(name)` - Sharp-spelled name of the transposed note
/// * `Err(UnknownNote)` - `base_name` is not in the chromatic alphabet
pub fn transpose_note_name(base_name: &str, semitones: i32) -> Result<&'static str, TrainerError> {
    let base: PitchClass = base_name.parse()?;
    Ok(base.transpose(semitones).name())
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}
