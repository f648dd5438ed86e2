//! Error types for the theory engine.
//!
//! Every fallible operation rejects its input before touching any
//! [`Composition`](crate::composer::Composition) state, so a failed call
//! leaves the composition exactly as it was.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TheoryError {
    /// Note text that is not `<letter>[#|b]<octave>`.
    #[error("invalid pitch: '{0}'")]
    InvalidPitch(String),

    #[error("unknown chord type: '{0}'")]
    UnknownChordType(String),

    #[error("unknown chord root: '{0}'")]
    UnknownRoot(String),

    /// Durations must be finite and positive.
    #[error("invalid duration: {0} beats")]
    InvalidDuration(f64),

    #[error("invalid {key}: '{value}'")]
    InvalidSetting { key: String, value: String },

    #[error("audio backend: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, TheoryError>;

/// Error in a line-oriented text file (scripts, settings).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Error reading and parsing a file from disk.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TheoryError::InvalidPitch("H4".into()).to_string(),
            "invalid pitch: 'H4'"
        );
        assert_eq!(
            TheoryError::InvalidSetting {
                key: "speed".into(),
                value: "3".into()
            }
            .to_string(),
            "invalid speed: '3'"
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(3, "unknown key 'tempo'");
        assert_eq!(err.to_string(), "line 3: unknown key 'tempo'");
    }
}
