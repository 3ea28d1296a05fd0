//! Note sequences handed to the staff renderer.
//!
//! Rendering itself happens elsewhere. This module decides which notes are
//! drawn, which accidental each carries and which key signature the staff
//! uses.

use serde::Serialize;

use crate::scales::{ArpeggioSpec, ScaleSpec, cumulative_offsets};
use crate::tuning::{Note, frequency_to_note};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accidental {
    Sharp,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffNote {
    pub note: Note,
    pub accidental: Option<Accidental>,
}

impl StaffNote {
    pub fn new(note: Note) -> Self {
        let accidental = note.pitch_class.is_sharp().then_some(Accidental::Sharp);
        Self { note, accidental }
    }

    /// Renderer key, e.g. `"D#/4"`.
    pub fn key(&self) -> String {
        self.note.to_string()
    }
}

/// Ordered notes plus the key signature of the staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffSequence {
    pub notes: Vec<StaffNote>,
    pub key_signature: String,
}

impl StaffSequence {
    /// Builds a sequence whose key signature follows its first note.
    pub fn from_notes(notes: Vec<Note>) -> Self {
        let key_signature = notes
            .first()
            .map(|n| normalize_key_signature(n.pitch_class.name()).to_string())
            .unwrap_or_else(|| "C".to_string());
        Self {
            notes: notes.into_iter().map(StaffNote::new).collect(),
            key_signature,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.notes.iter().map(StaffNote::key).collect()
    }
}

/// Replaces key names the renderer does not accept with an enharmonic
/// equivalent. Anything else is returned unchanged.
pub fn normalize_key_signature(key: &str) -> &str {
    match key {
        "D#" => "Eb",
        "G#" => "Ab",
        "A#" => "Bb",
        "Fb" => "E",
        "Cb" => "B",
        "E#" => "F",
        other => other,
    }
}

/// Root followed by each cumulative step, with octave carry.
pub fn staff_keys(root: Note, steps: &[i32]) -> Vec<Note> {
    cumulative_offsets(steps)
        .into_iter()
        .map(|offset| root.transpose(offset))
        .collect()
}

fn mirror_without_top(ascending: &[Note]) -> Vec<Note> {
    let end = ascending.len().saturating_sub(1);
    ascending[..end].iter().rev().copied().collect()
}

/// Up-and-down staff for a scale.
pub fn scale_staff(root: Note, spec: &ScaleSpec) -> StaffSequence {
    let mut notes = staff_keys(root, spec.ascending_steps);
    let descending = mirror_without_top(&staff_keys(root, spec.descending_steps));
    notes.extend(descending);
    StaffSequence::from_notes(notes)
}

/// Up-and-down staff for an arpeggio.
pub fn arpeggio_staff(root: Note, spec: &ArpeggioSpec) -> StaffSequence {
    let ascending: Vec<Note> = spec
        .semitone_offsets
        .iter()
        .map(|&offset| root.transpose(offset))
        .collect();
    let mut notes = ascending.clone();
    notes.extend(mirror_without_top(&ascending));
    StaffSequence::from_notes(notes)
}

/// Staff for an arbitrary run of frequencies, each named by nearest note.
pub fn series_staff(frequencies: &[f64]) -> StaffSequence {
    StaffSequence::from_notes(frequencies.iter().map(|&f| frequency_to_note(f)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scales::{ArpeggioType, ScaleType};
    use crate::tuning::PitchClass;

    #[test]
    fn key_signature_normalization() {
        assert_eq!(normalize_key_signature("D#"), "Eb");
        assert_eq!(normalize_key_signature("G#"), "Ab");
        assert_eq!(normalize_key_signature("A#"), "Bb");
        assert_eq!(normalize_key_signature("Fb"), "E");
        assert_eq!(normalize_key_signature("Cb"), "B");
        assert_eq!(normalize_key_signature("E#"), "F");
        assert_eq!(normalize_key_signature("F#"), "F#");
        assert_eq!(normalize_key_signature("C"), "C");
    }

    #[test]
    fn d_major_scale_staff() {
        let root = Note::new(PitchClass::D, 4);
        let staff = scale_staff(root, &ScaleType::Major.spec());
        assert_eq!(
            staff.keys(),
            vec![
                "D/4", "E/4", "F#/4", "G/4", "A/4", "B/4", "C#/5", "D/5", "C#/5", "B/4", "A/4",
                "G/4", "F#/4", "E/4", "D/4"
            ]
        );
        assert_eq!(staff.key_signature, "D");
        assert_eq!(staff.notes[2].accidental, Some(Accidental::Sharp));
        assert_eq!(staff.notes[1].accidental, None);
    }

    #[test]
    fn melodic_minor_staff_descends_natural() {
        let root = Note::new(PitchClass::A, 4);
        let staff = scale_staff(root, &ScaleType::MelodicMinor.spec());
        let keys = staff.keys();
        // Up: F#, G#; down: G, F.
        assert_eq!(keys[5], "F#/5");
        assert_eq!(keys[6], "G#/5");
        assert_eq!(keys[8], "G/5");
        assert_eq!(keys[9], "F/5");
        assert_eq!(keys.last().unwrap(), "A/4");
    }

    #[test]
    fn key_signature_from_first_note() {
        let staff = scale_staff(Note::new(PitchClass::DSharp, 4), &ScaleType::Major.spec());
        assert_eq!(staff.key_signature, "Eb");
        let staff = arpeggio_staff(Note::new(PitchClass::ASharp, 4), &ArpeggioType::Minor.spec());
        assert_eq!(staff.key_signature, "Bb");
        assert_eq!(staff.notes.len(), 7);
    }

    #[test]
    fn series_staff_names_nearest_notes() {
        let staff = series_staff(&[116.54, 233.08, 349.62, 466.16]);
        assert_eq!(staff.keys(), vec!["A#/2", "A#/3", "F/4", "A#/4"]);
        assert_eq!(staff.key_signature, "Bb");
    }

    #[test]
    fn empty_series_defaults_to_c() {
        let staff = series_staff(&[]);
        assert!(staff.notes.is_empty());
        assert_eq!(staff.key_signature, "C");
    }
}
