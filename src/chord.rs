//! Chord templates, recognition and generation.
//!
//! [`TEMPLATES`] is the single chord table. Recognition walks it in declared
//! order and takes the first exact match, so the order is a priority list.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, TheoryError};
use crate::note::{NoteName, Pitch, split_letter_accidental};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChordType {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Dominant7,
    Major7,
    Minor7,
    Diminished7,
    Augmented7,
}

/// One row of the chord table.
#[derive(Debug)]
pub struct ChordTemplate {
    pub chord_type: ChordType,
    /// Lookup key accepted by [`generate`].
    pub key: &'static str,
    /// Appended to the root when labelling (`""` for major).
    pub suffix: &'static str,
    /// Semitone offsets from the root, ascending.
    pub offsets: &'static [i32],
}

pub static TEMPLATES: [ChordTemplate; 11] = [
    ChordTemplate { chord_type: ChordType::Major, key: "major", suffix: "", offsets: &[0, 4, 7] },
    ChordTemplate { chord_type: ChordType::Minor, key: "minor", suffix: "m", offsets: &[0, 3, 7] },
    ChordTemplate { chord_type: ChordType::Diminished, key: "diminished", suffix: "diminished", offsets: &[0, 3, 6] },
    ChordTemplate { chord_type: ChordType::Augmented, key: "augmented", suffix: "augmented", offsets: &[0, 4, 8] },
    ChordTemplate { chord_type: ChordType::Sus2, key: "sus2", suffix: "sus2", offsets: &[0, 2, 7] },
    ChordTemplate { chord_type: ChordType::Sus4, key: "sus4", suffix: "sus4", offsets: &[0, 5, 7] },
    ChordTemplate { chord_type: ChordType::Dominant7, key: "dominant7", suffix: "7", offsets: &[0, 4, 7, 10] },
    ChordTemplate { chord_type: ChordType::Major7, key: "major7", suffix: "maj7", offsets: &[0, 4, 7, 11] },
    ChordTemplate { chord_type: ChordType::Minor7, key: "minor7", suffix: "m7", offsets: &[0, 3, 7, 10] },
    ChordTemplate { chord_type: ChordType::Diminished7, key: "diminished7", suffix: "dim7", offsets: &[0, 3, 6, 9] },
    ChordTemplate { chord_type: ChordType::Augmented7, key: "augmented7", suffix: "aug7", offsets: &[0, 4, 8, 10] },
];

impl ChordType {
    pub fn template(self) -> &'static ChordTemplate {
        TEMPLATES
            .iter()
            .find(|t| t.chord_type == self)
            .unwrap_or(&TEMPLATES[0])
    }

    pub fn offsets(self) -> &'static [i32] {
        self.template().offsets
    }

    pub fn suffix(self) -> &'static str {
        self.template().suffix
    }

    /// Resolve a table key (`"minor7"`) or any symbol suffix (`"m7"`).
    pub fn from_key(key: &str) -> Result<ChordType> {
        if let Some(t) = TEMPLATES.iter().find(|t| t.key == key) {
            return Ok(t.chord_type);
        }
        if key.is_empty() {
            return Err(TheoryError::UnknownChordType(key.to_string()));
        }
        Self::from_suffix(key)
    }

    /// Lead-sheet suffixes, the empty string being major.
    pub fn from_suffix(suffix: &str) -> Result<ChordType> {
        let chord_type = match suffix {
            "" | "maj" | "M" => ChordType::Major,
            "m" | "min" | "-" => ChordType::Minor,
            "diminished" | "dim" | "°" => ChordType::Diminished,
            "augmented" | "aug" | "+" => ChordType::Augmented,
            "sus2" => ChordType::Sus2,
            "sus4" | "sus" => ChordType::Sus4,
            "7" => ChordType::Dominant7,
            "maj7" | "M7" => ChordType::Major7,
            "m7" | "min7" | "-7" => ChordType::Minor7,
            "dim7" | "°7" => ChordType::Diminished7,
            "aug7" | "+7" => ChordType::Augmented7,
            _ => return Err(TheoryError::UnknownChordType(suffix.to_string())),
        };
        Ok(chord_type)
    }
}

/// A root plus chord quality, independent of octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub root: NoteName,
    pub chord_type: ChordType,
}

impl Chord {
    pub fn new(root: NoteName, chord_type: ChordType) -> Self {
        Self { root, chord_type }
    }

    /// Parse a chord symbol such as `C`, `Am7`, `F#dim` or `Bbsus4`.
    pub fn parse_symbol(symbol: &str) -> Result<Chord> {
        let (offset, suffix) = split_letter_accidental(symbol)
            .ok_or_else(|| TheoryError::UnknownRoot(symbol.to_string()))?;
        let chord_type = ChordType::from_suffix(suffix)?;
        Ok(Chord::new(NoteName::from_pitch_class(offset), chord_type))
    }

    /// Concrete pitches with the root in `octave`, ascending.
    pub fn pitches(self, octave: i32) -> Vec<Pitch> {
        let root_index = self.root.semitone() as i32;
        self.chord_type
            .offsets()
            .iter()
            .map(|offset| {
                let absolute = root_index + offset;
                Pitch::new(
                    NoteName::from_pitch_class(absolute),
                    octave.saturating_add(absolute.div_euclid(12)),
                )
            })
            .collect()
    }

    pub fn label(self) -> String {
        format!("{}{}", self.root, self.chord_type.suffix())
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.chord_type.suffix())
    }
}

/// Result of [`recognize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// No pitches were given.
    Empty,
    Chord(Chord),
    /// Nothing in the table matched; holds the input spellings joined by
    /// spaces, for display as-is.
    Unrecognized(String),
}

impl Recognition {
    pub fn chord(&self) -> Option<Chord> {
        match self {
            Recognition::Chord(chord) => Some(*chord),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recognition::Empty => Ok(()),
            Recognition::Chord(chord) => write!(f, "{}", chord),
            Recognition::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Name the chord formed by `pitches`.
///
/// The lowest sounding pitch is always the root; inversions are not
/// analysed. Octave doublings collapse to one pitch class.
pub fn recognize(pitches: &[Pitch]) -> Recognition {
    let raw = pitches
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    match match_template(pitches) {
        Some(chord) => Recognition::Chord(chord),
        None if pitches.is_empty() => Recognition::Empty,
        None => Recognition::Unrecognized(raw),
    }
}

/// Like [`recognize`], but takes note text and keeps the caller's spelling
/// (`Db4` stays `Db4`) in the unrecognized fallback.
pub fn recognize_text<S: AsRef<str>>(notes: &[S]) -> Result<Recognition> {
    let pitches = notes
        .iter()
        .map(|n| Pitch::parse(n.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(match recognize(&pitches) {
        Recognition::Unrecognized(_) => Recognition::Unrecognized(
            notes.iter().map(|n| n.as_ref()).collect::<Vec<_>>().join(" "),
        ),
        other => other,
    })
}

fn match_template(pitches: &[Pitch]) -> Option<Chord> {
    let mut semitones: Vec<i32> = pitches.iter().map(|p| p.to_semitone()).collect();
    semitones.sort_unstable();
    let root = *semitones.first()?;

    let mut intervals: Vec<i32> = semitones
        .iter()
        .map(|&s| (i64::from(s) - i64::from(root)).rem_euclid(12) as i32)
        .collect();
    intervals.sort_unstable();
    intervals.dedup();

    TEMPLATES.iter().find_map(|template| {
        if template.offsets.len() != intervals.len() {
            return None;
        }
        let mut classes: Vec<i32> = template.offsets.iter().map(|o| o.rem_euclid(12)).collect();
        classes.sort_unstable();
        (classes == intervals).then(|| Chord::new(NoteName::from_pitch_class(root), template.chord_type))
    })
}

/// Build the pitches of `chord_type` rooted on `root` (no octave, e.g. `"Eb"`),
/// with the root in `octave`.
pub fn generate(root: &str, chord_type: &str, octave: i32) -> Result<Vec<Pitch>> {
    let chord_type = ChordType::from_key(chord_type)?;
    let root =
        NoteName::parse_root(root).ok_or_else(|| TheoryError::UnknownRoot(root.to_string()))?;
    Ok(Chord::new(root, chord_type).pitches(octave))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitches(notes: &[&str]) -> Vec<Pitch> {
        notes.iter().map(|n| Pitch::parse(n).unwrap()).collect()
    }

    fn names(pitches: &[Pitch]) -> Vec<String> {
        pitches.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_recognize_major_and_minor() {
        assert_eq!(recognize(&pitches(&["C4", "E4", "G4"])).label(), "C");
        assert_eq!(recognize(&pitches(&["C4", "D#4", "G4"])).label(), "Cm");
        assert_eq!(recognize(&pitches(&["C4", "Eb4", "G4"])).label(), "Cm");
    }

    #[test]
    fn test_recognize_is_order_independent() {
        assert_eq!(recognize(&pitches(&["G4", "C4", "E4"])).label(), "C");
    }

    #[test]
    fn test_lowest_pitch_is_root() {
        // First inversion of C major: E is lowest, so this is not a C chord
        let r = recognize(&pitches(&["E4", "G4", "C5"]));
        assert_eq!(r, Recognition::Unrecognized("E4 G4 C5".to_string()));
    }

    #[test]
    fn test_octave_doublings_collapse() {
        assert_eq!(recognize(&pitches(&["C4", "E4", "G4", "C5"])).label(), "C");
        assert_eq!(recognize(&pitches(&["A3", "C4", "E4", "A4", "E5"])).label(), "Am");
    }

    #[test]
    fn test_recognize_sevenths() {
        assert_eq!(recognize(&pitches(&["G3", "B3", "D4", "F4"])).label(), "G7");
        assert_eq!(recognize(&pitches(&["C4", "D#4", "F#4", "A4"])).label(), "Cdim7");
        assert_eq!(recognize(&pitches(&["D4", "F4", "A4", "C5"])).label(), "Dm7");
    }

    #[test]
    fn test_recognize_empty() {
        assert_eq!(recognize(&[]), Recognition::Empty);
        assert_eq!(recognize(&[]).label(), "");
    }

    #[test]
    fn test_recognize_text_keeps_spelling() {
        let r = recognize_text(&["Db4", "G4"]).unwrap();
        assert_eq!(r, Recognition::Unrecognized("Db4 G4".to_string()));
        assert_eq!(
            recognize_text(&["H4"]),
            Err(TheoryError::InvalidPitch("H4".to_string()))
        );
    }

    #[test]
    fn test_generate_triads() {
        assert_eq!(names(&generate("C", "major", 4).unwrap()), ["C4", "E4", "G4"]);
        assert_eq!(names(&generate("A", "minor", 3).unwrap()), ["A3", "C4", "E4"]);
        assert_eq!(names(&generate("Bb", "major", 3).unwrap()), ["A#3", "D4", "F4"]);
    }

    #[test]
    fn test_generate_octave_rollover() {
        assert_eq!(
            names(&generate("G", "dominant7", 4).unwrap()),
            ["G4", "B4", "D5", "F5"]
        );
        assert_eq!(names(&generate("B", "m7", 4).unwrap()), ["B4", "D5", "F#5", "A5"]);
    }

    #[test]
    fn test_generate_errors() {
        assert_eq!(
            generate("C", "power", 4),
            Err(TheoryError::UnknownChordType("power".to_string()))
        );
        assert_eq!(
            generate("H", "major", 4),
            Err(TheoryError::UnknownRoot("H".to_string()))
        );
    }

    #[test]
    fn test_generate_then_recognize_every_template() {
        for template in &TEMPLATES {
            for root in NoteName::ALL {
                let chord = Chord::new(root, template.chord_type);
                let generated = generate(root.as_str(), template.key, 3).unwrap();
                assert_eq!(recognize(&generated), Recognition::Chord(chord));
            }
        }
    }

    #[test]
    fn test_triad_labels_spell_out_quality() {
        assert_eq!(recognize(&pitches(&["C4", "D#4", "F#4"])).label(), "Cdiminished");
        assert_eq!(recognize(&pitches(&["C4", "E4", "G#4"])).label(), "Caugmented");
        assert_eq!(recognize(&pitches(&["C4", "E4", "G#4", "A#4"])).label(), "Caug7");
        assert_eq!(
            Chord::parse_symbol("Caugmented").unwrap(),
            Chord::parse_symbol("Caug").unwrap()
        );
    }

    #[test]
    fn test_parse_symbol() {
        let am7 = Chord::parse_symbol("Am7").unwrap();
        assert_eq!(am7, Chord::new(NoteName::A, ChordType::Minor7));
        assert_eq!(Chord::parse_symbol("F#").unwrap().label(), "F#");
        assert_eq!(
            Chord::parse_symbol("Bbdim").unwrap(),
            Chord::new(NoteName::ASharp, ChordType::Diminished)
        );
        assert!(matches!(
            Chord::parse_symbol("Cfoo"),
            Err(TheoryError::UnknownChordType(_))
        ));
        assert!(matches!(
            Chord::parse_symbol("X7"),
            Err(TheoryError::UnknownRoot(_))
        ));
    }

    #[test]
    fn test_table_order_is_declared_order() {
        assert_eq!(TEMPLATES[0].chord_type, ChordType::Major);
        assert_eq!(TEMPLATES[1].chord_type, ChordType::Minor);
        assert_eq!(ChordType::Diminished7.suffix(), "dim7");
    }
}
