//! Per-measure harmony and block-chord accompaniment.
//!
//! The harmony is a fixed rule rather than an analysis: the most
//! frequent pitch class in the measure picks one of four C major triads.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::chord::{Chord, ChordType};
use crate::composer::Note;
use crate::note::{NoteName, Pitch};

/// Longest block chord, in beats. A measure is covered by consecutive
/// windows of this length, the last one possibly shorter.
pub const WINDOW_BEATS: f64 = 2.0;

/// Scale degree of the chosen triad in C major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Degree {
    I,
    IV,
    V,
    #[serde(rename = "vi")]
    Vi,
}

/// Rows are checked top to bottom; the first row containing the dominant
/// pitch class wins, and anything unmatched falls back to I.
const DEGREE_RULES: [(Degree, [u8; 3]); 4] = [
    (Degree::I, [0, 4, 7]),
    (Degree::IV, [5, 9, 0]),
    (Degree::V, [7, 11, 2]),
    (Degree::Vi, [9, 0, 4]),
];

impl Degree {
    pub fn for_pitch_class(pc: u8) -> Degree {
        DEGREE_RULES
            .iter()
            .find(|(_, classes)| classes.contains(&pc))
            .map(|(degree, _)| *degree)
            .unwrap_or(Degree::I)
    }

    pub fn chord(self) -> Chord {
        match self {
            Degree::I => Chord::new(NoteName::C, ChordType::Major),
            Degree::IV => Chord::new(NoteName::F, ChordType::Major),
            Degree::V => Chord::new(NoteName::G, ChordType::Major),
            Degree::Vi => Chord::new(NoteName::A, ChordType::Minor),
        }
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Degree::I => "I",
            Degree::IV => "IV",
            Degree::V => "V",
            Degree::Vi => "vi",
        })
    }
}

/// A non-melodic note generated for a measure. Never edited in place; the
/// whole list is rebuilt whenever the melody changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccompanimentNote {
    pub pitch: Pitch,
    pub duration: f64,
    pub time: f64,
}

/// Everything derived from a measure's melody.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accompaniment {
    /// Dominant note name, followed by the numeral unless the degree is I
    /// (`E`, `FIV`, `BV`). Empty when the melody is empty.
    pub label: String,
    pub degree: Option<Degree>,
    /// The triad voiced underneath (`C`, `F`, `G` or `Am`).
    pub chord: Option<Chord>,
    pub chord_pitches: Vec<Pitch>,
    pub notes: Vec<AccompanimentNote>,
}

/// Derive harmony and block chords for one measure.
///
/// `capacity` is the measure length in beats and `octave` the register the
/// triad root is voiced in. Pure: the same melody always gives the same
/// result.
pub fn derive(melody: &[Note], capacity: f64, octave: i32) -> Accompaniment {
    let Some(dominant) = dominant_pitch_class(melody) else {
        return Accompaniment::default();
    };

    let degree = Degree::for_pitch_class(dominant);
    let chord = degree.chord();
    let chord_pitches = chord.pitches(octave);

    let mut notes = Vec::new();
    let mut time = 0.0;
    while time < capacity {
        let duration = WINDOW_BEATS.min(capacity - time);
        notes.extend(chord_pitches.iter().map(|&pitch| AccompanimentNote {
            pitch,
            duration,
            time,
        }));
        time += WINDOW_BEATS;
    }

    debug!(
        "dominant pitch class {} -> {} ({}), {} accompaniment notes",
        dominant,
        degree,
        chord,
        notes.len()
    );

    let root = NoteName::from_pitch_class(i32::from(dominant));
    let label = match degree {
        Degree::I => root.to_string(),
        _ => format!("{}{}", root, degree),
    };

    Accompaniment {
        label,
        degree: Some(degree),
        chord: Some(chord),
        chord_pitches,
        notes,
    }
}

/// Most frequent pitch class by note count; ties go to the lowest pitch
/// class.
fn dominant_pitch_class(melody: &[Note]) -> Option<u8> {
    let mut counts = [0usize; 12];
    for note in melody {
        counts[note.pitch.pitch_class() as usize] += 1;
    }

    let mut best: Option<(u8, usize)> = None;
    for (pc, &count) in (0u8..).zip(counts.iter()) {
        if count > 0 && best.is_none_or(|(_, top)| count > top) {
            best = Some((pc, count));
        }
    }
    best.map(|(pc, _)| pc)
}
