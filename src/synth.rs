//! Tone emission: the frequency table, the note envelope and audio sinks.
//!
//! [`ToneSink`] is the only seam to an audio backend. [`AudioEngine`] sounds
//! tones on the default cpal output device; [`ToneLog`] just records them.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, warn};

use crate::error::{Result, TheoryError};
use crate::note::{NoteName, Pitch};

/// Octaves covered by the frequency table.
pub const TABLE_OCTAVES: std::ops::RangeInclusive<i32> = 0..=8;

static FREQUENCIES: LazyLock<HashMap<Pitch, f64>> = LazyLock::new(|| {
    TABLE_OCTAVES
        .flat_map(|octave| NoteName::ALL.map(|name| Pitch::new(name, octave)))
        .map(|pitch| (pitch, pitch.to_freq()))
        .collect()
});

/// Equal-tempered frequency (A4 = 440 Hz), or `None` outside the table.
pub fn frequency_of(pitch: Pitch) -> Option<f64> {
    FREQUENCIES.get(&pitch).copied()
}

/// Anything that can sound a single tone. Emission is fire-and-forget: the
/// call returns immediately and never fails.
pub trait ToneSink {
    fn emit_tone(&mut self, frequency_hz: f64, duration_secs: f64, volume: f64);
}

impl<T: ToneSink + ?Sized> ToneSink for &mut T {
    fn emit_tone(&mut self, frequency_hz: f64, duration_secs: f64, volume: f64) {
        (**self).emit_tone(frequency_hz, duration_secs, volume)
    }
}

/// Look up `pitch` and emit it. Unmapped pitches emit nothing; returns
/// whether a tone was sent.
pub fn play_tone<S: ToneSink + ?Sized>(
    sink: &mut S,
    pitch: Pitch,
    duration_secs: f64,
    volume: f64,
) -> bool {
    match frequency_of(pitch) {
        Some(freq) => {
            sink.emit_tone(freq, duration_secs, volume);
            true
        }
        None => {
            debug!("no frequency for {}, skipping", pitch);
            false
        }
    }
}

/// Linear attack to the peak, then exponential decay to `floor` at the end
/// of the note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack_secs: f64,
    pub floor: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack_secs: 0.01,
            floor: 0.01,
        }
    }
}

impl Envelope {
    /// Gain at `t` seconds into a note of `duration` seconds peaking at `peak`.
    pub fn gain(&self, t: f64, duration: f64, peak: f64) -> f64 {
        if t < 0.0 || t >= duration || peak <= 0.0 {
            return 0.0;
        }
        let attack = self.attack_secs.min(duration);
        if t < attack {
            return peak * t / attack;
        }
        let decay_len = duration - attack;
        if decay_len <= 0.0 {
            return peak;
        }
        let target = self.floor.min(peak);
        peak * (target / peak).powf((t - attack) / decay_len)
    }
}

/// An in-flight tone in the mixer.
struct Voice {
    freq: f64,
    peak: f64,
    duration_secs: f64,
    elapsed: usize,
}

impl Voice {
    fn finished(&self, sample_rate: f64) -> bool {
        self.elapsed as f64 / sample_rate >= self.duration_secs
    }

    fn next_sample(&mut self, sample_rate: f64, envelope: &Envelope) -> f64 {
        let t = self.elapsed as f64 / sample_rate;
        self.elapsed += 1;
        let gain = envelope.gain(t, self.duration_secs, self.peak);
        gain * (t * self.freq * std::f64::consts::TAU).sin()
    }
}

/// A command sent to the audio thread
enum AudioCommand {
    Tone {
        freq: f64,
        duration_secs: f64,
        volume: f64,
    },
    /// Drop every sounding voice
    Silence,
}

/// Sendable handle for emitting tones into a running [`AudioEngine`].
#[derive(Clone)]
pub struct ToneSender(mpsc::Sender<AudioCommand>);

impl ToneSender {
    /// Cut off everything currently sounding.
    pub fn silence(&self) {
        let _ = self.0.send(AudioCommand::Silence);
    }
}

impl ToneSink for ToneSender {
    fn emit_tone(&mut self, frequency_hz: f64, duration_secs: f64, volume: f64) {
        // A closed stream means playback is shutting down; nothing to report.
        let _ = self.0.send(AudioCommand::Tone {
            freq: frequency_hz,
            duration_secs,
            volume,
        });
    }
}

/// Sine-tone output on the default cpal device. Any number of tones may
/// overlap; they are summed and clipped to [-1, 1].
///
/// The stream lives as long as the engine; hand [`AudioEngine::sender`] to
/// other threads.
pub struct AudioEngine {
    sender: ToneSender,
    _stream: cpal::Stream,
}

impl AudioEngine {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TheoryError::Audio("no output audio device available".into()))?;

        let config = device
            .default_output_config()
            .map_err(|e| TheoryError::Audio(format!("failed to get default output config: {}", e)))?;

        let sample_rate = config.sample_rate() as f64;
        let channels = config.channels().max(1) as usize;
        let envelope = Envelope::default();

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let mut voices: Vec<Voice> = Vec::new();

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = rx.try_recv() {
                        match cmd {
                            AudioCommand::Tone {
                                freq,
                                duration_secs,
                                volume,
                            } => voices.push(Voice {
                                freq,
                                peak: volume,
                                duration_secs,
                                elapsed: 0,
                            }),
                            AudioCommand::Silence => voices.clear(),
                        }
                    }

                    for frame in data.chunks_mut(channels) {
                        let mut value = 0.0_f64;
                        for voice in voices.iter_mut() {
                            value += voice.next_sample(sample_rate, &envelope);
                        }
                        let sample = value.clamp(-1.0, 1.0) as f32;
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                    voices.retain(|v| !v.finished(sample_rate));
                },
                move |err| {
                    warn!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| TheoryError::Audio(format!("failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| TheoryError::Audio(format!("failed to play stream: {}", e)))?;

        debug!("audio engine running at {} Hz, {} channels", sample_rate, channels);
        Ok(Self {
            sender: ToneSender(tx),
            _stream: stream,
        })
    }

    pub fn sender(&self) -> ToneSender {
        self.sender.clone()
    }

    pub fn silence(&self) {
        self.sender.silence();
    }
}

impl ToneSink for AudioEngine {
    fn emit_tone(&mut self, frequency_hz: f64, duration_secs: f64, volume: f64) {
        self.sender.emit_tone(frequency_hz, duration_secs, volume);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedTone {
    pub frequency_hz: f64,
    pub duration_secs: f64,
    pub volume: f64,
}

/// Records tones instead of sounding them.
#[derive(Debug, Default, Clone)]
pub struct ToneLog {
    pub tones: Vec<EmittedTone>,
}

impl ToneSink for ToneLog {
    fn emit_tone(&mut self, frequency_hz: f64, duration_secs: f64, volume: f64) {
        self.tones.push(EmittedTone {
            frequency_hz,
            duration_secs,
            volume,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_frequencies() {
        let a4 = frequency_of(Pitch::parse("A4").unwrap()).unwrap();
        assert!((a4 - 440.0).abs() < 1e-9);
        let c5 = frequency_of(Pitch::parse("C5").unwrap()).unwrap();
        assert!((c5 - 523.25).abs() < 0.01);
        assert_eq!(FREQUENCIES.len(), 9 * 12);
    }

    #[test]
    fn test_unmapped_pitch_is_silent() {
        let mut log = ToneLog::default();
        let low = Pitch::parse("C-1").unwrap();
        assert_eq!(frequency_of(low), None);
        assert!(!play_tone(&mut log, low, 1.0, 0.3));
        assert!(log.tones.is_empty());

        assert!(play_tone(&mut log, Pitch::parse("E4").unwrap(), 0.5, 0.15));
        assert_eq!(log.tones.len(), 1);
        assert_eq!(log.tones[0].volume, 0.15);
    }

    #[test]
    fn test_envelope_shape() {
        let env = Envelope::default();
        assert_eq!(env.gain(0.0, 1.0, 0.3), 0.0);
        assert!((env.gain(0.005, 1.0, 0.3) - 0.15).abs() < 1e-9);
        assert!((env.gain(0.01, 1.0, 0.3) - 0.3).abs() < 1e-9);
        let late = env.gain(0.999, 1.0, 0.3);
        assert!(late > 0.0 && late < 0.011);
        assert_eq!(env.gain(1.0, 1.0, 0.3), 0.0);
    }

    #[test]
    fn test_envelope_decays_monotonically() {
        let env = Envelope::default();
        let mut last = f64::MAX;
        for step in 1..100 {
            let g = env.gain(0.01 + step as f64 * 0.009, 1.0, 0.3);
            assert!(g <= last);
            last = g;
        }
    }

    #[test]
    fn test_voice_finishes() {
        let mut voice = Voice {
            freq: 440.0,
            peak: 0.3,
            duration_secs: 0.001,
            elapsed: 0,
        };
        let env = Envelope::default();
        for _ in 0..48 {
            let s = voice.next_sample(48_000.0, &env);
            assert!(s.abs() <= 0.3);
        }
        assert!(voice.finished(48_000.0));
    }
}
