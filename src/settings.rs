//! Composer settings loaded from `.settings` files and command-line flags.
//!
//! A settings file holds `key: value` lines, with `#` comments:
//! ```text
//! # waltz, slow
//! time_signature: 3/4
//! duration: 0.5
//! speed: 0.75
//! octave: 3
//! ```
//! Every value is checked against its allowed domain when it is set.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{LoadError, ParseError, Result, TheoryError};

/// Note lengths a user may pick, in beats.
pub const NOTE_DURATIONS: [f64; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Octaves available for note entry and accompaniment voicing.
pub const OCTAVES: [i32; 3] = [3, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TimeSignature {
    #[serde(rename = "2/4")]
    TwoFour,
    #[serde(rename = "3/4")]
    ThreeFour,
    #[default]
    #[serde(rename = "4/4")]
    FourFour,
}

impl TimeSignature {
    /// Measure length in beats.
    pub fn capacity(self) -> f64 {
        match self {
            TimeSignature::TwoFour => 2.0,
            TimeSignature::ThreeFour => 3.0,
            TimeSignature::FourFour => 4.0,
        }
    }
}

impl FromStr for TimeSignature {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "2/4" => Ok(TimeSignature::TwoFour),
            "3/4" => Ok(TimeSignature::ThreeFour),
            "4/4" => Ok(TimeSignature::FourFour),
            other => Err(invalid("time_signature", other)),
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeSignature::TwoFour => "2/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::FourFour => "4/4",
        })
    }
}

fn invalid(key: &str, value: impl ToString) -> TheoryError {
    TheoryError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub fn validate_duration(beats: f64) -> Result<f64> {
    if NOTE_DURATIONS.contains(&beats) {
        Ok(beats)
    } else {
        Err(invalid("duration", beats))
    }
}

pub fn validate_speed(speed: f64) -> Result<f64> {
    if (MIN_SPEED..=MAX_SPEED).contains(&speed) {
        Ok(speed)
    } else {
        Err(invalid("speed", speed))
    }
}

pub fn validate_octave(octave: i32) -> Result<i32> {
    if OCTAVES.contains(&octave) {
        Ok(octave)
    } else {
        Err(invalid("octave", octave))
    }
}

/// Everything the user can adjust while composing. Changes take effect
/// immediately and are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub time_signature: TimeSignature,
    /// Beats given to each entered note.
    pub note_duration: f64,
    /// Playback speed multiplier.
    pub speed: f64,
    /// Octave for note entry and accompaniment.
    pub octave: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_signature: TimeSignature::FourFour,
            note_duration: 1.0,
            speed: 1.0,
            octave: 4,
        }
    }
}

impl Settings {
    /// Whether `key` names a setting.
    pub fn is_key(key: &str) -> bool {
        matches!(key, "time_signature" | "duration" | "speed" | "octave")
    }

    /// Set one value from its text form. Leaves `self` untouched on error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "time_signature" => self.time_signature = value.parse()?,
            "duration" => {
                let beats = value.parse().map_err(|_| invalid(key, value))?;
                self.note_duration = validate_duration(beats)?;
            }
            "speed" => {
                let speed = value.parse().map_err(|_| invalid(key, value))?;
                self.speed = validate_speed(speed)?;
            }
            "octave" => {
                let octave = value.parse().map_err(|_| invalid(key, value))?;
                self.octave = validate_octave(octave)?;
            }
            _ => return Err(invalid("key", key)),
        }
        Ok(())
    }

    /// Parse settings text on top of the defaults.
    pub fn parse(content: &str) -> std::result::Result<Settings, ParseError> {
        let mut settings = Settings::default();
        for (line_idx, line) in content.lines().enumerate() {
            let Some((key, value)) = parse_kv(line) else {
                continue;
            };
            if !Self::is_key(key) {
                return Err(ParseError::new(
                    line_idx + 1,
                    format!("unknown key '{}'", key),
                ));
            }
            settings
                .apply(key, value)
                .map_err(|e| ParseError::new(line_idx + 1, e.to_string()))?;
        }
        Ok(settings)
    }

    /// Load settings from a `.settings` file.
    pub fn load(path: &Path) -> std::result::Result<Settings, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content)?)
    }
}

/// Parse a single "key: value" line. Returns (key, value) or None.
pub(crate) fn parse_kv(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once(':')?;
    Some((key.trim(), value.trim()))
}
