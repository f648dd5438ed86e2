//! Chord recognition and generation, measure-based rhythm composing with
//! derived block-chord accompaniment, and cancellable timed playback.

pub mod accompaniment;
pub mod chord;
pub mod composer;
pub mod error;
pub mod note;
pub mod parser;
pub mod scheduler;
pub mod settings;
pub mod synth;

pub use chord::{Chord, ChordType, Recognition, generate, recognize};
pub use composer::{Composition, Measure, Note, Session};
pub use error::{ParseError, TheoryError};
pub use note::{NoteName, Pitch};
pub use settings::{Settings, TimeSignature};
