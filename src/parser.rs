//! Note-entry scripts and the live keyboard layout.
//!
//! A `.compose` script replays what a user would type into the composer:
//! ```text
//! # settings, one per line
//! time_signature: 3/4
//! duration: 1
//! octave: 4
//!
//! # notes: pitch text or solfege, optionally with :beats
//! C4 E4 G4:0.5 G4:0.5
//! do re mi:2 |
//!
//! delete: 2
//! reset
//! ```
//! Bar lines (`|`) are accepted and ignored; measures are formed
//! automatically.

use crate::composer::Session;
use crate::error::{ParseError, Result, TheoryError};
use crate::note::{NoteName, Pitch};
use crate::settings::{Settings, parse_kv};

/// Map a keyboard character to a (NoteName, octave_offset) pair.
/// The octave_offset indicates notes that spill into the next octave
/// on the keyboard layout (k, l, ;, ', o, p).
pub fn char_to_note(c: char) -> Option<(NoteName, i32)> {
    match c {
        // Home row: natural notes
        'a' => Some((NoteName::C, 0)),
        's' => Some((NoteName::D, 0)),
        'd' => Some((NoteName::E, 0)),
        'f' => Some((NoteName::F, 0)),
        'g' => Some((NoteName::G, 0)),
        'h' => Some((NoteName::A, 0)),
        'j' => Some((NoteName::B, 0)),
        'k' => Some((NoteName::C, 1)),
        'l' => Some((NoteName::D, 1)),
        ';' => Some((NoteName::E, 1)),
        '\'' => Some((NoteName::F, 1)),

        // Top row: sharps
        'w' => Some((NoteName::CSharp, 0)),
        'e' => Some((NoteName::DSharp, 0)),
        't' => Some((NoteName::FSharp, 0)),
        'y' => Some((NoteName::GSharp, 0)),
        'u' => Some((NoteName::ASharp, 0)),
        'o' => Some((NoteName::CSharp, 1)),
        'p' => Some((NoteName::DSharp, 1)),

        _ => None,
    }
}

/// What a note token names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteRef {
    /// Explicit pitch with octave, e.g. `Db4`
    Pitch(Pitch),
    /// Solfege syllable, voiced in the selected octave
    Solfege(NoteName),
}

/// One instruction from a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Set { key: String, value: String },
    Note { note: NoteRef, duration: Option<f64> },
    /// Delete a measure (1-indexed, as displayed)
    Delete(usize),
    Reset,
}

/// Cut a `#` comment off `line`. A comment starts at a `#` that opens the
/// line or follows whitespace; a `#` inside a token is a sharp (`C#4`).
fn strip_comment(line: &str) -> &str {
    let mut prev_is_space = true;
    for (idx, c) in line.char_indices() {
        if c == '#' && prev_is_space {
            return &line[..idx];
        }
        prev_is_space = c.is_whitespace();
    }
    line
}

/// Parse one line into directives. Blank and comment lines yield nothing.
pub fn parse_line(line: &str) -> Result<Vec<Directive>> {
    let trimmed = strip_comment(line).trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Some((key, value)) = parse_kv(trimmed) {
        if Settings::is_key(key) {
            return Ok(vec![Directive::Set {
                key: key.to_string(),
                value: value.to_string(),
            }]);
        }
        if key == "delete" {
            let index = value
                .parse::<usize>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| TheoryError::InvalidSetting {
                    key: "measure number".into(),
                    value: value.to_string(),
                })?;
            return Ok(vec![Directive::Delete(index)]);
        }
    }

    trimmed
        .split_whitespace()
        .filter(|token| *token != "|")
        .map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Result<Directive> {
    if token.eq_ignore_ascii_case("reset") {
        return Ok(Directive::Reset);
    }

    let (name, duration) = match token.split_once(':') {
        Some((name, beats)) => {
            let beats = beats
                .parse::<f64>()
                .map_err(|_| TheoryError::InvalidSetting {
                    key: "duration".into(),
                    value: beats.to_string(),
                })?;
            (name, Some(beats))
        }
        None => (token, None),
    };

    let note = match NoteName::from_solfege(name) {
        Some(name) => NoteRef::Solfege(name),
        None => NoteRef::Pitch(Pitch::parse(name)?),
    };
    Ok(Directive::Note { note, duration })
}

/// Apply one directive to a session.
pub fn apply(session: &mut Session, directive: &Directive) -> Result<()> {
    match directive {
        Directive::Set { key, value } => session.set(key, value)?,
        Directive::Note { note, duration } => {
            match *note {
                NoteRef::Pitch(pitch) => session.enter(pitch, *duration)?,
                NoteRef::Solfege(name) => session.enter_name(name, 0, *duration)?,
            };
        }
        Directive::Delete(number) => {
            session
                .delete_measure(number - 1)
                .ok_or_else(|| TheoryError::InvalidSetting {
                    key: "measure number".into(),
                    value: number.to_string(),
                })?;
        }
        Directive::Reset => session.reset(),
    }
    Ok(())
}

/// Run a whole script against `session`, line by line.
///
/// Stops at the first bad line; everything before it stays applied.
pub fn run(session: &mut Session, input: &str) -> std::result::Result<(), ParseError> {
    for (line_idx, line) in input.lines().enumerate() {
        let at_line = |e: TheoryError| ParseError::new(line_idx + 1, e.to_string());
        for directive in parse_line(line).map_err(at_line)? {
            apply(session, &directive).map_err(at_line)?;
        }
    }
    Ok(())
}
