//! Measure accumulation: turns a stream of (pitch, duration) entries into
//! fixed-length measures, each with a derived harmony and accompaniment.
//!
//! A [`Composition`] is always ready for input. When the active measure has
//! too little room for the requested duration, the whole note moves to a
//! freshly appended measure; notes are never split across a bar line.

use serde::Serialize;
use tracing::debug;

use crate::accompaniment::{self, Accompaniment};
use crate::error::{Result, TheoryError};
use crate::note::{NoteName, Pitch};
use crate::settings::{Settings, TimeSignature, validate_duration, validate_octave};

/// A melody note. `time` is the beat offset within its measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Note {
    pub pitch: Pitch,
    pub duration: f64,
    pub time: f64,
}

impl Note {
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }
}

/// One bar. Its capacity is fixed when it is created; the accompaniment is
/// derived state, rebuilt from `notes` after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    capacity: f64,
    notes: Vec<Note>,
    accompaniment: Accompaniment,
}

impl Measure {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity,
            notes: Vec::new(),
            accompaniment: Accompaniment::default(),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Melody notes in insertion (chronological) order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn accompaniment(&self) -> &Accompaniment {
        &self.accompaniment
    }

    /// Harmony label (`E`, `BV`), empty until the measure has notes.
    pub fn label(&self) -> &str {
        &self.accompaniment.label
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Furthest beat reached by any note.
    pub fn filled_beats(&self) -> f64 {
        self.notes.iter().map(Note::end).fold(0.0, f64::max)
    }

    fn rederive(&mut self, octave: i32) {
        self.accompaniment = accompaniment::derive(&self.notes, self.capacity, octave);
    }
}

/// Where the next note goes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Cursor {
    pub measure: usize,
    pub beat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    measures: Vec<Measure>,
    time_signature: TimeSignature,
    accompaniment_octave: i32,
    cursor: Cursor,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new(TimeSignature::default(), 4)
    }
}

impl Composition {
    pub fn new(time_signature: TimeSignature, accompaniment_octave: i32) -> Self {
        Self {
            measures: vec![Measure::new(time_signature.capacity())],
            time_signature,
            accompaniment_octave,
            cursor: Cursor::default(),
        }
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn measure(&self, index: usize) -> Option<&Measure> {
        self.measures.get(index)
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn accompaniment_octave(&self) -> i32 {
        self.accompaniment_octave
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Beats left in the measure under the cursor.
    pub fn remaining_beats(&self) -> f64 {
        (self.active().capacity - self.cursor.beat).max(0.0)
    }

    fn active(&self) -> &Measure {
        &self.measures[self.cursor.measure]
    }

    fn active_mut(&mut self) -> &mut Measure {
        &mut self.measures[self.cursor.measure]
    }

    /// Add a note at the cursor.
    ///
    /// If the active measure cannot hold `duration`, it is finalized and
    /// the note goes at beat 0 of a new measure. A duration longer than a
    /// whole measure is clamped to the measure's capacity. Returns the note
    /// as placed.
    pub fn insert(&mut self, pitch: Pitch, duration: f64) -> Result<Note> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(TheoryError::InvalidDuration(duration));
        }

        let octave = self.accompaniment_octave;
        let fresh_capacity = self.time_signature.capacity();
        let mut remaining = self.remaining_beats();

        // Only roll over when a new measure actually offers more room.
        if remaining < duration && remaining < fresh_capacity {
            self.active_mut().rederive(octave);
            self.measures.push(Measure::new(fresh_capacity));
            self.cursor = Cursor {
                measure: self.measures.len() - 1,
                beat: 0.0,
            };
            remaining = fresh_capacity;
            debug!(
                "measure full, starting measure {}",
                self.measures.len()
            );
        }

        let note = Note {
            pitch,
            duration: duration.min(remaining),
            time: self.cursor.beat,
        };
        self.cursor.beat += note.duration;

        let measure = self.active_mut();
        measure.notes.push(note);
        measure.rederive(octave);
        Ok(note)
    }

    /// Parse `text` as a pitch and insert it. Nothing changes on a bad pitch.
    pub fn insert_text(&mut self, text: &str, duration: f64) -> Result<Note> {
        let pitch = Pitch::parse(text)?;
        self.insert(pitch, duration)
    }

    /// Remove the measure at `index`, returning it.
    ///
    /// Removing the only measure leaves one empty measure behind. Returns
    /// `None` without changes for an out-of-range index.
    pub fn delete_measure(&mut self, index: usize) -> Option<Measure> {
        if index >= self.measures.len() {
            return None;
        }

        if self.measures.len() == 1 {
            let fresh = Measure::new(self.time_signature.capacity());
            self.cursor = Cursor::default();
            return Some(std::mem::replace(&mut self.measures[0], fresh));
        }

        let removed = self.measures.remove(index);
        if index < self.cursor.measure {
            self.cursor.measure -= 1;
        } else if index == self.cursor.measure || self.cursor.measure >= self.measures.len() {
            let last = self.measures.len() - 1;
            self.cursor = Cursor {
                measure: last,
                beat: self.measures[last].filled_beats(),
            };
        }
        debug!("deleted measure {}, {} left", index + 1, self.measures.len());
        Some(removed)
    }

    /// Back to a single empty measure.
    pub fn reset(&mut self) {
        self.measures = vec![Measure::new(self.time_signature.capacity())];
        self.cursor = Cursor::default();
    }

    /// Switch time signature for the current and future measures.
    ///
    /// Finished measures keep their length and note timings. The cursor
    /// returns to beat 0 of the current measure, which takes the new length
    /// only if it is still empty.
    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        self.cursor.beat = 0.0;
        let measure = self.active_mut();
        if measure.is_empty() {
            measure.capacity = time_signature.capacity();
        }
    }

    /// Octave used for accompaniment derived from now on.
    pub fn set_accompaniment_octave(&mut self, octave: i32) -> Result<()> {
        self.accompaniment_octave = validate_octave(octave)?;
        Ok(())
    }
}

/// A composition together with the settings note entry uses.
///
/// Setting changes are pushed into the composition as they happen, so the
/// two never disagree about time signature or octave.
#[derive(Debug, Clone, Default)]
pub struct Session {
    settings: Settings,
    composition: Composition,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            composition: Composition::new(settings.time_signature, settings.octave),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn into_composition(self) -> Composition {
        self.composition
    }

    /// Change one setting by key (see [`Settings::apply`]).
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let before = self.settings;
        self.settings.apply(key, value)?;
        if self.settings.time_signature != before.time_signature {
            self.composition.set_time_signature(self.settings.time_signature);
        }
        if self.settings.octave != before.octave {
            self.composition.set_accompaniment_octave(self.settings.octave)?;
        }
        Ok(())
    }

    /// Enter `pitch`, for `duration` beats or the selected note length.
    pub fn enter(&mut self, pitch: Pitch, duration: Option<f64>) -> Result<Note> {
        let duration = match duration {
            Some(beats) => validate_duration(beats)?,
            None => self.settings.note_duration,
        };
        self.composition.insert(pitch, duration)
    }

    /// Enter a note name in the selected octave, shifted up by
    /// `octave_offset`.
    pub fn enter_name(
        &mut self,
        name: NoteName,
        octave_offset: i32,
        duration: Option<f64>,
    ) -> Result<Note> {
        let pitch = Pitch::new(name, self.settings.octave + octave_offset);
        self.enter(pitch, duration)
    }

    pub fn delete_measure(&mut self, index: usize) -> Option<Measure> {
        self.composition.delete_measure(index)
    }

    pub fn reset(&mut self) {
        self.composition.reset();
    }
}
