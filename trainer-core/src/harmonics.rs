//! # Harmonic Series Module
//!
//! Natural harmonics of the B♭ horn for each valve combination.
//!
//! Each fingering lowers the open horn's fundamental; the player practises
//! the partials above it. A progression walks through several fingerings
//! in order of pitch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrainerError;
use crate::intervals::Tier;

/// Fundamental multiplied by 1..=count.
pub fn harmonic_series(fundamental: f64, count: usize) -> Vec<f64> {
    (1..=count).map(|n| fundamental * n as f64).collect()
}

/// Number of partials practised at each difficulty.
pub fn harmonic_count(tier: Tier) -> usize {
    match tier {
        Tier::Easy => 4,
        Tier::Medium => 6,
        Tier::Hard => 8,
    }
}

/// A horn fingering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValveCombination {
    Open,
    First,
    Second,
    Third,
    FirstSecond,
    SecondThird,
    FirstThird,
    All,
}

impl ValveCombination {
    pub const ALL: [ValveCombination; 8] = [
        ValveCombination::Open,
        ValveCombination::First,
        ValveCombination::Second,
        ValveCombination::Third,
        ValveCombination::FirstSecond,
        ValveCombination::SecondThird,
        ValveCombination::FirstThird,
        ValveCombination::All,
    ];

    /// Approximate fundamental in Hz.
    pub fn fundamental(self) -> f64 {
        match self {
            ValveCombination::Open => 116.54,
            ValveCombination::First => 110.00,
            ValveCombination::Second => 103.83,
            ValveCombination::Third => 98.00,
            ValveCombination::FirstSecond => 92.50,
            ValveCombination::SecondThird => 87.31,
            ValveCombination::FirstThird => 82.41,
            ValveCombination::All => 77.78,
        }
    }

    /// Fingering label, e.g. `"1-2"`; `"0"` for open.
    pub fn label(self) -> &'static str {
        match self {
            ValveCombination::Open => "0",
            ValveCombination::First => "1",
            ValveCombination::Second => "2",
            ValveCombination::Third => "3",
            ValveCombination::FirstSecond => "1-2",
            ValveCombination::SecondThird => "2-3",
            ValveCombination::FirstThird => "1-3",
            ValveCombination::All => "1-2-3",
        }
    }

    pub fn series(self, tier: Tier) -> Vec<f64> {
        harmonic_series(self.fundamental(), harmonic_count(tier))
    }
}

impl fmt::Display for ValveCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ValveCombination {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|combo| combo.label() == label)
            .ok_or_else(|| TrainerError::unknown_option("valve combination", s))
    }
}

/// How far a harmonics exercise travels from the chosen fingering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Progression {
    /// Only the chosen fingering
    #[default]
    None,
    /// From the chosen fingering up to the highest fundamental
    Up,
    /// From the chosen fingering down to the lowest fundamental
    Down,
}

impl FromStr for Progression {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Progression::None),
            "up" => Ok(Progression::Up),
            "down" => Ok(Progression::Down),
            other => Err(TrainerError::unknown_option("progression", other)),
        }
    }
}

/// The fingerings visited by a progression, in playing order.
pub fn progression_combinations(start: ValveCombination, progression: Progression) -> Vec<ValveCombination> {
    let by_pitch = || {
        let mut combos = ValveCombination::ALL.to_vec();
        combos.sort_by(|a, b| a.fundamental().total_cmp(&b.fundamental()));
        let position = combos.iter().position(|&c| c == start).unwrap_or(0);
        (combos, position)
    };

    match progression {
        Progression::None => vec![start],
        Progression::Up => {
            let (combos, position) = by_pitch();
            combos[position..].to_vec()
        }
        Progression::Down => {
            let (combos, position) = by_pitch();
            combos[..=position].iter().rev().copied().collect()
        }
    }
}

/// A planned harmonics exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicsPlan {
    pub combinations: Vec<ValveCombination>,
    /// Every series concatenated, in playing order.
    pub playback: Vec<f64>,
    /// Series shown on the staff: the last fingering visited.
    pub display: Vec<f64>,
}

pub fn plan_harmonics(start: ValveCombination, tier: Tier, progression: Progression) -> HarmonicsPlan {
    let combinations = progression_combinations(start, progression);
    let playback = combinations
        .iter()
        .flat_map(|combo| combo.series(tier))
        .collect();
    let display = combinations
        .last()
        .copied()
        .unwrap_or(start)
        .series(tier);
    HarmonicsPlan {
        combinations,
        playback,
        display,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn series_is_integer_multiples() {
        for &f in &[77.78, 116.54, 440.0] {
            for n in 1..=12 {
                let series = harmonic_series(f, n);
                assert_eq!(series.len(), n);
                for (k, value) in series.iter().enumerate() {
                    assert_relative_eq!(*value, f * (k + 1) as f64);
                }
            }
        }
        assert!(harmonic_series(100.0, 0).is_empty());
    }

    #[test]
    fn counts_by_tier() {
        assert_eq!(ValveCombination::Open.series(Tier::Easy).len(), 4);
        assert_eq!(ValveCombination::Open.series(Tier::Medium).len(), 6);
        assert_eq!(ValveCombination::Open.series(Tier::Hard).len(), 8);
    }

    #[test]
    fn progression_up_from_second_valve() {
        let combos = progression_combinations(ValveCombination::Second, Progression::Up);
        assert_eq!(
            combos,
            vec![ValveCombination::Second, ValveCombination::First, ValveCombination::Open]
        );
    }

    #[test]
    fn progression_down_from_second_valve() {
        let combos = progression_combinations(ValveCombination::Second, Progression::Down);
        assert_eq!(combos.first(), Some(&ValveCombination::Second));
        assert_eq!(combos.last(), Some(&ValveCombination::All));
        assert_eq!(combos.len(), 6);
        assert!(combos.windows(2).all(|w| w[0].fundamental() > w[1].fundamental()));
    }

    #[test]
    fn plan_concatenates_and_displays_last() {
        let plan = plan_harmonics(ValveCombination::First, Tier::Easy, Progression::Up);
        assert_eq!(plan.combinations.len(), 2);
        assert_eq!(plan.playback.len(), 8);
        assert_relative_eq!(plan.playback[0], 110.0);
        assert_relative_eq!(plan.playback[4], 116.54);
        assert_eq!(plan.display, ValveCombination::Open.series(Tier::Easy));
    }

    #[test]
    fn parse_labels() {
        assert_eq!("1-3".parse::<ValveCombination>().unwrap(), ValveCombination::FirstThird);
        assert_eq!("0".parse::<ValveCombination>().unwrap(), ValveCombination::Open);
        assert!("4".parse::<ValveCombination>().is_err());
        assert_eq!("down".parse::<Progression>().unwrap(), Progression::Down);
    }
}
