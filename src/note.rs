//! Pitch model: note names, octaves and the linear semitone scale.
//!
//! Spellings are normalized on parse. Flats become their sharp equivalent
//! (`Db4` is stored as `C#4`), and spellings that cross an octave boundary
//! land in the right octave (`Cb4` is `B3`, `B#4` is `C5`). Comparison always
//! goes through the semitone value, never the text.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{Result, TheoryError};

/// Semitone index of C4 (middle C).
pub const MIDDLE_C: i32 = 60;

/// Octave that [`MIDDLE_C`] lives in.
pub const REFERENCE_OCTAVE: i32 = 4;

/// Musical note names (chromatic scale, sharp spellings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteName {
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

impl NoteName {
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Pitch class within an octave (C=0, B=11)
    pub fn semitone(self) -> u8 {
        match self {
            NoteName::C => 0,
            NoteName::CSharp => 1,
            NoteName::D => 2,
            NoteName::DSharp => 3,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::FSharp => 6,
            NoteName::G => 7,
            NoteName::GSharp => 8,
            NoteName::A => 9,
            NoteName::ASharp => 10,
            NoteName::B => 11,
        }
    }

    /// Note name for a pitch class. Any integer is reduced mod 12.
    pub fn from_pitch_class(pc: i32) -> NoteName {
        Self::ALL[pc.rem_euclid(12) as usize]
    }

    /// Resolve a root spelling without octave (`C`, `F#`, `Bb`) to its
    /// pitch class. Flats and sharps may wrap around the octave.
    pub fn parse_root(text: &str) -> Option<NoteName> {
        let (offset, rest) = split_letter_accidental(text)?;
        if !rest.is_empty() {
            return None;
        }
        Some(Self::from_pitch_class(offset))
    }

    /// Fixed-do solfege syllables in C major.
    pub fn from_solfege(syllable: &str) -> Option<NoteName> {
        match syllable.to_ascii_lowercase().as_str() {
            "do" => Some(NoteName::C),
            "re" => Some(NoteName::D),
            "mi" => Some(NoteName::E),
            "fa" => Some(NoteName::F),
            "sol" | "so" => Some(NoteName::G),
            "la" => Some(NoteName::A),
            "ti" | "si" => Some(NoteName::B),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NoteName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Splits `<letter>[#|b]` off the front of `text`, returning the signed
/// pitch-class offset (unreduced, so `Cb` is -1) and the remainder.
pub(crate) fn split_letter_accidental(text: &str) -> Option<(i32, &str)> {
    let mut chars = text.chars();
    let base = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (offset, rest) = match rest.as_bytes().first() {
        Some(b'#') => (base + 1, &rest[1..]),
        Some(b'b') => (base - 1, &rest[1..]),
        _ => (base, rest),
    };
    Some((offset, rest))
}

/// A concrete pitch: note name plus octave.
///
/// Immutable once built; two pitches are equal exactly when they sound the
/// same semitone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    name: NoteName,
    octave: i32,
}

impl Pitch {
    pub fn new(name: NoteName, octave: i32) -> Self {
        Self { name, octave }
    }

    /// Parse `<letter>[#|b]<octave>`, e.g. `C4`, `F#3`, `Db5`, `A-1`.
    ///
    /// Any integer octave is accepted as long as the semitone index fits in
    /// an `i32`; anything further out is an invalid pitch.
    pub fn parse(text: &str) -> Result<Pitch> {
        let invalid = || TheoryError::InvalidPitch(text.to_string());
        let (offset, octave_text) = split_letter_accidental(text).ok_or_else(invalid)?;
        let octave: i32 = octave_text.parse().map_err(|_| invalid())?;
        let semitone = octave
            .checked_sub(REFERENCE_OCTAVE)
            .and_then(|o| o.checked_mul(12))
            .and_then(|s| s.checked_add(offset + MIDDLE_C))
            .ok_or_else(invalid)?;
        Ok(Pitch::from_semitone(semitone))
    }

    /// Inverse of [`Pitch::to_semitone`]. Always yields the sharp spelling.
    pub fn from_semitone(value: i32) -> Pitch {
        let relative = value.saturating_sub(MIDDLE_C);
        Pitch {
            name: NoteName::from_pitch_class(relative),
            octave: REFERENCE_OCTAVE + relative.div_euclid(12),
        }
    }

    /// Linear semitone index, C4 = 60. Saturates for octaves built with
    /// [`Pitch::new`] that lie beyond the `i32` semitone range.
    pub fn to_semitone(self) -> i32 {
        self.octave
            .saturating_sub(REFERENCE_OCTAVE)
            .saturating_mul(12)
            .saturating_add(self.name.semitone() as i32 + MIDDLE_C)
    }

    pub fn name(self) -> NoteName {
        self.name
    }

    pub fn octave(self) -> i32 {
        self.octave
    }

    /// Pitch class (0..12).
    pub fn pitch_class(self) -> u8 {
        self.name.semitone()
    }

    /// Frequency in Hz (A4 = 440 Hz)
    pub fn to_freq(self) -> f64 {
        440.0 * 2.0_f64.powf((f64::from(self.to_semitone()) - 69.0) / 12.0)
    }

    pub fn transpose(self, semitones: i32) -> Pitch {
        Pitch::from_semitone(self.to_semitone().saturating_add(semitones))
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_semitone().cmp(&other.to_semitone())
    }
}

impl FromStr for Pitch {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self> {
        Pitch::parse(s)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_c_semitone() {
        assert_eq!(Pitch::parse("C4").unwrap().to_semitone(), 60);
        assert_eq!(Pitch::parse("A4").unwrap().to_semitone(), 69);
        assert_eq!(Pitch::parse("C-1").unwrap().to_semitone(), 0);
    }

    #[test]
    fn test_a4_frequency() {
        let freq = Pitch::parse("A4").unwrap().to_freq();
        assert!((freq - 440.0).abs() < 0.01);
        let c4 = Pitch::parse("C4").unwrap().to_freq();
        assert!((c4 - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_semitones() {
        assert_eq!(NoteName::C.semitone(), 0);
        assert_eq!(NoteName::B.semitone(), 11);
    }

    #[test]
    fn test_flats_normalize_to_sharps() {
        let db = Pitch::parse("Db4").unwrap();
        let cs = Pitch::parse("C#4").unwrap();
        assert_eq!(db, cs);
        assert_eq!(db.to_string(), "C#4");
        assert_eq!(Pitch::parse("Bb3").unwrap().to_string(), "A#3");
    }

    #[test]
    fn test_accidentals_cross_octave() {
        assert_eq!(Pitch::parse("Cb4").unwrap().to_string(), "B3");
        assert_eq!(Pitch::parse("B#4").unwrap().to_string(), "C5");
        assert_eq!(Pitch::parse("E#4").unwrap().to_string(), "F4");
    }

    #[test]
    fn test_invalid_pitches() {
        for text in ["", "H4", "C", "C#", "Cx4", "c4", "C4.5", "C#b4"] {
            assert_eq!(
                Pitch::parse(text),
                Err(TheoryError::InvalidPitch(text.to_string())),
                "{text}"
            );
        }
    }

    #[test]
    fn test_semitone_round_trip() {
        for text in ["C4", "Db4", "G#2", "Bb5", "Cb4", "E#3", "A0", "F#-1"] {
            let pitch = Pitch::parse(text).unwrap();
            let back = Pitch::from_semitone(pitch.to_semitone());
            assert_eq!(back, pitch, "{text}");
            assert_eq!(back.to_semitone(), pitch.to_semitone());
        }
    }

    #[test]
    fn test_huge_octave_is_rejected() {
        for text in ["C999999999", "B178956970", "C-999999999"] {
            assert_eq!(
                Pitch::parse(text),
                Err(TheoryError::InvalidPitch(text.to_string())),
                "{text}"
            );
        }
        let far = Pitch::new(NoteName::G, i32::MAX);
        assert_eq!(far.to_semitone(), i32::MAX);
        assert_eq!(far.transpose(12).to_semitone(), i32::MAX);
    }

    #[test]
    fn test_note_name_serializes_as_text() {
        assert_eq!(serde_json::to_string(&NoteName::FSharp).unwrap(), "\"F#\"");
        assert_eq!(serde_json::to_string(&Pitch::parse("Db4").unwrap()).unwrap(), "\"C#4\"");
    }

    #[test]
    fn test_from_semitone_negative() {
        let p = Pitch::from_semitone(-1);
        assert_eq!(p.name(), NoteName::B);
        assert_eq!(p.octave(), -2);
    }

    #[test]
    fn test_parse_root() {
        assert_eq!(NoteName::parse_root("F#"), Some(NoteName::FSharp));
        assert_eq!(NoteName::parse_root("Bb"), Some(NoteName::ASharp));
        assert_eq!(NoteName::parse_root("Cb"), Some(NoteName::B));
        assert_eq!(NoteName::parse_root("H"), None);
        assert_eq!(NoteName::parse_root("C4"), None);
    }

    #[test]
    fn test_solfege() {
        assert_eq!(NoteName::from_solfege("sol"), Some(NoteName::G));
        assert_eq!(NoteName::from_solfege("Ti"), Some(NoteName::B));
        assert_eq!(NoteName::from_solfege("xa"), None);
    }
}
