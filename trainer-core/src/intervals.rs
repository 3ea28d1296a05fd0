//! Interval catalog and difficulty tiers.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::TrainerError;

/// A named interval with its distance in semitones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub name: &'static str,
    pub semitones: u8,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Difficulty level gating intervals and base-note ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Easy, Tier::Medium, Tier::Hard];

    /// Intervals available at this tier, ordered by size.
    pub fn intervals(self) -> &'static [Interval] {
        match self {
            Tier::Easy => &EASY,
            Tier::Medium => &MEDIUM,
            Tier::Hard => &HARD,
        }
    }

    /// Range for randomly drawn base frequencies, or `None` when the tier
    /// draws from the reference note table instead.
    pub fn base_frequency_range(self) -> Option<(f64, f64)> {
        match self {
            Tier::Easy => None,
            Tier::Medium => Some((220.0, 700.0)),
            Tier::Hard => Some((110.0, 800.0)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Easy => write!(f, "easy"),
            Tier::Medium => write!(f, "medium"),
            Tier::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Tier {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Tier::Easy),
            "medium" => Ok(Tier::Medium),
            "hard" => Ok(Tier::Hard),
            other => Err(TrainerError::unknown_option("tier", other)),
        }
    }
}

const fn interval(name: &'static str, semitones: u8) -> Interval {
    Interval { name, semitones }
}

/// Every interval in ascending order, tagged with the easiest tier that
/// offers it.
const CATALOG: [(Interval, Tier); 16] = [
    (interval("Minor second", 1), Tier::Easy),
    (interval("Major second", 2), Tier::Easy),
    (interval("Minor third", 3), Tier::Medium),
    (interval("Major third", 4), Tier::Medium),
    (interval("Perfect fourth", 5), Tier::Easy),
    (interval("Tritone", 6), Tier::Medium),
    (interval("Perfect fifth", 7), Tier::Easy),
    (interval("Minor sixth", 8), Tier::Medium),
    (interval("Major sixth", 9), Tier::Medium),
    (interval("Minor seventh", 10), Tier::Medium),
    (interval("Major seventh", 11), Tier::Medium),
    (interval("Octave", 12), Tier::Easy),
    (interval("Minor ninth", 13), Tier::Hard),
    (interval("Major ninth", 14), Tier::Hard),
    (interval("Minor tenth", 15), Tier::Hard),
    (interval("Major tenth", 16), Tier::Hard),
];

fn offered_at(tier: Tier) -> Vec<Interval> {
    CATALOG
        .iter()
        .filter(|(_, easiest)| *easiest <= tier)
        .map(|(interval, _)| *interval)
        .collect()
}

static EASY: Lazy<Vec<Interval>> = Lazy::new(|| offered_at(Tier::Easy));
static MEDIUM: Lazy<Vec<Interval>> = Lazy::new(|| offered_at(Tier::Medium));
static HARD: Lazy<Vec<Interval>> = Lazy::new(|| offered_at(Tier::Hard));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_supersets() {
        for pair in Tier::ALL.windows(2) {
            let (smaller, larger) = (pair[0].intervals(), pair[1].intervals());
            assert!(smaller.iter().all(|i| larger.contains(i)), "{} ⊄ {}", pair[0], pair[1]);
            assert!(larger.len() > smaller.len());
        }
    }

    #[test]
    fn catalog_sizes_and_order() {
        assert_eq!(Tier::Easy.intervals().len(), 5);
        assert_eq!(Tier::Medium.intervals().len(), 12);
        assert_eq!(Tier::Hard.intervals().len(), 16);

        let medium: Vec<u8> = Tier::Medium.intervals().iter().map(|i| i.semitones).collect();
        assert_eq!(medium, (1..=12).collect::<Vec<u8>>());
        let hard_top = Tier::Hard.intervals().last().unwrap();
        assert_eq!(hard_top.semitones, 16);
    }

    #[test]
    fn every_tier_ascends_strictly() {
        for tier in Tier::ALL {
            let semitones: Vec<u8> = tier.intervals().iter().map(|i| i.semitones).collect();
            assert!(semitones.windows(2).all(|w| w[0] < w[1]), "{tier}: {semitones:?}");
        }
        assert_eq!(
            Tier::Easy.intervals().iter().map(|i| i.semitones).collect::<Vec<u8>>(),
            vec![1, 2, 5, 7, 12]
        );
        assert!(Tier::Easy < Tier::Medium && Tier::Medium < Tier::Hard);
    }

    #[test]
    fn semitones_unique_within_tier() {
        for tier in Tier::ALL {
            let mut seen: Vec<u8> = tier.intervals().iter().map(|i| i.semitones).collect();
            seen.dedup();
            assert_eq!(seen.len(), tier.intervals().len());
        }
    }

    #[test]
    fn tier_parsing() {
        assert_eq!("Hard".parse::<Tier>().unwrap(), Tier::Hard);
        assert!(matches!(
            "expert".parse::<Tier>(),
            Err(TrainerError::UnknownOption { kind: "tier", .. })
        ));
    }
}
