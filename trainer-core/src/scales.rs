//! # Scale and Arpeggio Module
//!
//! Step patterns for the supported scales and arpeggios, and the frequency
//! sequences generated from them.
//!
//! Every sequence follows the same shape: the ascending run includes the
//! root, the descending run mirrors it without repeating the top note. The
//! melodic minor is the one asymmetric case: it rises with a raised 6th and
//! 7th and falls as the natural minor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrainerError;
use crate::tuning::interval_frequency;

/// Direction of a generated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleType {
    Major,
    NaturalMinor,
    HarmonicMinor,
    MelodicMinor,
    /// The "oriental" mode: minor 2nd, augmented 2nd, then Phrygian-like steps.
    Oriental,
    Pentatonic,
}

impl ScaleType {
    pub const ALL: [ScaleType; 6] = [
        ScaleType::Major,
        ScaleType::NaturalMinor,
        ScaleType::HarmonicMinor,
        ScaleType::MelodicMinor,
        ScaleType::Oriental,
        ScaleType::Pentatonic,
    ];

    /// Ascending step pattern in semitones.
    pub fn steps(self) -> &'static [i32] {
        match self {
            ScaleType::Major => &[2, 2, 1, 2, 2, 2, 1],
            ScaleType::NaturalMinor => &[2, 1, 2, 2, 1, 2, 2],
            ScaleType::HarmonicMinor => &[2, 1, 2, 2, 1, 3, 1],
            ScaleType::MelodicMinor => &[2, 1, 2, 2, 2, 2, 1],
            ScaleType::Oriental => &[1, 3, 1, 2, 1, 2, 2],
            ScaleType::Pentatonic => &[2, 2, 3, 2, 3],
        }
    }

    /// Full ascending/descending description of this scale.
    pub fn spec(self) -> ScaleSpec {
        let descending_steps = match self {
            ScaleType::MelodicMinor => ScaleType::NaturalMinor.steps(),
            other => other.steps(),
        };
        ScaleSpec {
            scale_type: self,
            ascending_steps: self.steps(),
            descending_steps,
        }
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaleType::Major => "major",
            ScaleType::NaturalMinor => "natural minor",
            ScaleType::HarmonicMinor => "harmonic minor",
            ScaleType::MelodicMinor => "melodic minor",
            ScaleType::Oriental => "oriental",
            ScaleType::Pentatonic => "pentatonic",
        };
        f.write_str(name)
    }
}

impl FromStr for ScaleType {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "major" => Ok(ScaleType::Major),
            "minor" | "natural-minor" => Ok(ScaleType::NaturalMinor),
            "harmonic" | "harmonic-minor" => Ok(ScaleType::HarmonicMinor),
            "melodic" | "melodic-minor" => Ok(ScaleType::MelodicMinor),
            "oriental" | "other" | "other-mode" => Ok(ScaleType::Oriental),
            "pentatonic" => Ok(ScaleType::Pentatonic),
            _ => Err(TrainerError::unknown_option("scale type", s)),
        }
    }
}

/// Step patterns of a scale for both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleSpec {
    pub scale_type: ScaleType,
    pub ascending_steps: &'static [i32],
    pub descending_steps: &'static [i32],
}

impl ScaleSpec {
    pub fn steps(&self, direction: Direction) -> &'static [i32] {
        match direction {
            Direction::Ascending => self.ascending_steps,
            Direction::Descending => self.descending_steps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArpeggioType {
    Major,
    Minor,
    Dominant7,
}

impl ArpeggioType {
    pub const ALL: [ArpeggioType; 3] = [ArpeggioType::Major, ArpeggioType::Minor, ArpeggioType::Dominant7];

    pub fn spec(self) -> ArpeggioSpec {
        let semitone_offsets: &'static [i32] = match self {
            ArpeggioType::Major => &[0, 4, 7, 12],
            ArpeggioType::Minor => &[0, 3, 7, 12],
            ArpeggioType::Dominant7 => &[0, 4, 7, 10],
        };
        ArpeggioSpec {
            arpeggio_type: self,
            semitone_offsets,
        }
    }
}

impl fmt::Display for ArpeggioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArpeggioType::Major => "major",
            ArpeggioType::Minor => "minor",
            ArpeggioType::Dominant7 => "dominant seventh",
        };
        f.write_str(name)
    }
}

impl FromStr for ArpeggioType {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(ArpeggioType::Major),
            "minor" => Ok(ArpeggioType::Minor),
            "dominant" | "dominant7" | "dominant-7" => Ok(ArpeggioType::Dominant7),
            _ => Err(TrainerError::unknown_option("arpeggio type", s)),
        }
    }
}

/// Semitone offsets of an arpeggio from its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpeggioSpec {
    pub arpeggio_type: ArpeggioType,
    pub semitone_offsets: &'static [i32],
}

/// Root followed by the running sum of `steps`, as semitone offsets.
pub fn cumulative_offsets(steps: &[i32]) -> Vec<i32> {
    let mut offsets = Vec::with_capacity(steps.len() + 1);
    let mut total = 0;
    offsets.push(total);
    for step in steps {
        total += step;
        offsets.push(total);
    }
    offsets
}

/// Drops the top note of an ascending run and reverses the rest.
fn mirror_without_top<T: Clone>(ascending: &[T]) -> Vec<T> {
    let end = ascending.len().saturating_sub(1);
    ascending[..end].iter().rev().cloned().collect()
}

/// Frequencies of a scale in one direction.
///
/// Ascending includes the root first and ends on the top note. Descending
/// starts one note below the top and ends on the root; for melodic minor it
/// is built from the natural-minor steps.
pub fn scale_frequencies(base: f64, spec: &ScaleSpec, direction: Direction) -> Vec<f64> {
    let run: Vec<f64> = cumulative_offsets(spec.steps(direction))
        .into_iter()
        .map(|offset| interval_frequency(base, offset as f64))
        .collect();
    match direction {
        Direction::Ascending => run,
        Direction::Descending => mirror_without_top(&run),
    }
}

/// Ascending run followed by the descending run, in playing order.
pub fn scale_playback(base: f64, spec: &ScaleSpec) -> Vec<f64> {
    let mut frequencies = scale_frequencies(base, spec, Direction::Ascending);
    frequencies.extend(scale_frequencies(base, spec, Direction::Descending));
    frequencies
}

/// Frequencies of an arpeggio in one direction.
pub fn arpeggio_frequencies(base: f64, spec: &ArpeggioSpec, direction: Direction) -> Vec<f64> {
    let ascending: Vec<f64> = spec
        .semitone_offsets
        .iter()
        .map(|&offset| interval_frequency(base, offset as f64))
        .collect();
    match direction {
        Direction::Ascending => ascending,
        Direction::Descending => mirror_without_top(&ascending),
    }
}

pub fn arpeggio_playback(base: f64, spec: &ArpeggioSpec) -> Vec<f64> {
    let mut frequencies = arpeggio_frequencies(base, spec, Direction::Ascending);
    frequencies.extend(arpeggio_frequencies(base, spec, Direction::Descending));
    frequencies
}
