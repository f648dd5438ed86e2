//! Playback: merges melody and accompaniment into one timeline per measure
//! and paces tone emission against an injected [`Clock`].
//!
//! Time in a schedule is in beats. At speed 1.0 one beat lasts one second;
//! every wait and every tone length is divided by the speed.
//!
//! Cancellation goes through a shared [`CancelToken`], checked before every
//! wait and before every tone, so a stop request takes effect before the next
//! scheduled event sounds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::composer::{Composition, Measure};
use crate::error::Result;
use crate::note::Pitch;
use crate::settings::validate_speed;
use crate::synth::{ToneSink, play_tone};

/// Pause between consecutive measures, in seconds at speed 1.0.
pub const MEASURE_GAP_SECS: f64 = 0.2;

pub const MELODY_VOLUME: f64 = 0.3;
pub const ACCOMPANIMENT_VOLUME: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Melody,
    Accompaniment,
}

impl Part {
    pub fn volume(self) -> f64 {
        match self {
            Part::Melody => MELODY_VOLUME,
            Part::Accompaniment => ACCOMPANIMENT_VOLUME,
        }
    }
}

/// One scheduled event: at this beat, sound this pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub duration: f64,
    pub pitch: Pitch,
    pub part: Part,
}

/// Melody then accompaniment, stably sorted by start time, so events that
/// start together keep melody-first, insertion order.
pub fn build_schedule(measure: &Measure) -> Vec<ScheduledEvent> {
    let melody = measure.notes().iter().map(|n| ScheduledEvent {
        time: n.time,
        duration: n.duration,
        pitch: n.pitch,
        part: Part::Melody,
    });
    let accompaniment = measure.accompaniment().notes.iter().map(|n| ScheduledEvent {
        time: n.time,
        duration: n.duration,
        pitch: n.pitch,
        part: Part::Accompaniment,
    });

    let mut events: Vec<ScheduledEvent> = melody.chain(accompaniment).collect();
    events.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    events
}

/// Start of each measure in seconds when a [`Player`] paces `composition`
/// at `speed`, and the total running time. Empty measures take no time but
/// are still followed by the inter-measure gap.
pub fn measure_offsets(composition: &Composition, speed: f64) -> (Vec<f64>, f64) {
    let count = composition.measures().len();
    let mut starts = Vec::with_capacity(count);
    let mut t = 0.0;
    for (i, measure) in composition.measures().iter().enumerate() {
        starts.push(t);
        if !measure.is_empty() {
            t += measure.capacity() / speed;
        }
        if i + 1 < count {
            t += MEASURE_GAP_SECS / speed;
        }
    }
    (starts, t)
}

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Source of waiting. A wait may end early once `cancel` is set.
pub trait Clock {
    fn wait(&mut self, seconds: f64, cancel: &CancelToken);
}

/// Wall-clock waits, sliced so cancellation is noticed within a few
/// milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

const WAIT_SLICE: Duration = Duration::from_millis(10);

impl Clock for SystemClock {
    fn wait(&mut self, seconds: f64, cancel: &CancelToken) {
        if seconds <= 0.0 {
            return;
        }
        let deadline = Instant::now() + Duration::from_secs_f64(seconds);
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

/// Records waits without sleeping. Optionally fires the cancel token once a
/// given number of waits have started, which stands in for a user pressing
/// stop while playback is suspended.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    pub waits: Vec<f64>,
    pub cancel_on_wait: Option<usize>,
}

impl ManualClock {
    pub fn cancelling_on_wait(n: usize) -> Self {
        Self {
            waits: Vec::new(),
            cancel_on_wait: Some(n),
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.waits.iter().sum()
    }
}

impl Clock for ManualClock {
    fn wait(&mut self, seconds: f64, cancel: &CancelToken) {
        self.waits.push(seconds);
        if self.cancel_on_wait == Some(self.waits.len()) {
            cancel.cancel();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Was stopped; the caller should now start playing.
    Started,
    /// Was playing; a stop has been requested.
    Stopped,
}

/// Running state shared between whoever drives playback and whoever
/// presses play/stop.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    playing: Arc<AtomicBool>,
    cancel: CancelToken,
}

impl Transport {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Play/stop button: starting while already playing means stop.
    pub fn toggle(&self) -> Toggle {
        match self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                self.cancel.reset();
                Toggle::Started
            }
            Err(_) => {
                self.cancel.cancel();
                Toggle::Stopped
            }
        }
    }

    pub fn stop(&self) {
        if self.is_playing() {
            self.cancel.cancel();
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.cancel.reset();
    }
}

/// Drives a [`ToneSink`] through a composition.
pub struct Player<C, S> {
    clock: C,
    sink: S,
    speed: f64,
}

impl<C: Clock, S: ToneSink> Player<C, S> {
    pub fn new(clock: C, sink: S, speed: f64) -> Result<Self> {
        Ok(Self {
            clock,
            sink,
            speed: validate_speed(speed)?,
        })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (C, S) {
        (self.clock, self.sink)
    }

    /// Play one measure and wait out its full length. Measures without
    /// melody are skipped.
    pub fn play_measure(&mut self, measure: &Measure, cancel: &CancelToken) -> PlaybackOutcome {
        if measure.is_empty() {
            return PlaybackOutcome::Finished;
        }

        let mut t = 0.0;
        for event in build_schedule(measure) {
            if event.time > t {
                if cancel.is_cancelled() {
                    return PlaybackOutcome::Cancelled;
                }
                self.clock.wait((event.time - t) / self.speed, cancel);
                t = event.time;
            }
            if cancel.is_cancelled() {
                return PlaybackOutcome::Cancelled;
            }
            play_tone(
                &mut self.sink,
                event.pitch,
                event.duration / self.speed,
                event.part.volume(),
            );
        }

        if cancel.is_cancelled() {
            return PlaybackOutcome::Cancelled;
        }
        if t < measure.capacity() {
            self.clock.wait((measure.capacity() - t) / self.speed, cancel);
        }
        if cancel.is_cancelled() {
            PlaybackOutcome::Cancelled
        } else {
            PlaybackOutcome::Finished
        }
    }

    /// Play every measure in order with a short gap between them.
    ///
    /// Marks `transport` as playing for the duration and stopped afterwards,
    /// however playback ends.
    pub fn play_composition(
        &mut self,
        composition: &Composition,
        transport: &Transport,
    ) -> PlaybackOutcome {
        transport.playing.store(true, Ordering::SeqCst);
        let cancel = transport.cancel_token().clone();
        let count = composition.measures().len();
        info!("playing {} measures at speed {}", count, self.speed);

        let mut outcome = PlaybackOutcome::Finished;
        for (i, measure) in composition.measures().iter().enumerate() {
            if cancel.is_cancelled() {
                outcome = PlaybackOutcome::Cancelled;
                break;
            }
            debug!("measure {} ({})", i + 1, measure.label());
            outcome = self.play_measure(measure, &cancel);
            if outcome == PlaybackOutcome::Cancelled {
                break;
            }
            if i + 1 < count {
                if cancel.is_cancelled() {
                    outcome = PlaybackOutcome::Cancelled;
                    break;
                }
                self.clock.wait(MEASURE_GAP_SECS / self.speed, &cancel);
            }
        }

        transport.finish();
        info!("playback {:?}", outcome);
        outcome
    }
}
