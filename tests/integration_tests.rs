//! Integration tests for clichord
//!
//! Drives the public API end to end: pitch text in, chords and measures out,
//! and playback against a manual clock.

use clichord::chord::{self, Chord, ChordType, Recognition, TEMPLATES};
use clichord::composer::{Composition, Session};
use clichord::note::{NoteName, Pitch};
use clichord::parser;
use clichord::scheduler::{ManualClock, PlaybackOutcome, Player, Toggle, Transport};
use clichord::settings::{Settings, TimeSignature};
use clichord::synth::ToneLog;

fn pitch(text: &str) -> Pitch {
    Pitch::parse(text).unwrap()
}

fn compose(script: &str) -> Composition {
    let mut session = Session::default();
    parser::run(&mut session, script).unwrap();
    session.into_composition()
}

#[test]
fn test_pitch_text_survives_semitone_round_trip() {
    for text in ["C4", "C#4", "Db4", "B3", "Cb4", "E#4", "A0", "G#8", "C-1"] {
        let parsed = pitch(text);
        let back = Pitch::from_semitone(parsed.to_semitone());
        assert_eq!(back, parsed, "{}", text);
        assert_eq!(back.to_semitone(), parsed.to_semitone());
    }
    assert_eq!(pitch("Db4").to_string(), "C#4");
    assert_eq!(pitch("Cb4").to_string(), "B3");
}

#[test]
fn test_generated_chords_are_recognized() {
    for root in NoteName::ALL {
        for template in TEMPLATES.iter() {
            for octave in [2, 4, 6] {
                let pitches = chord::generate(root.as_str(), template.key, octave).unwrap();
                let expected = Chord::new(root, template.chord_type);
                assert_eq!(
                    chord::recognize(&pitches),
                    Recognition::Chord(expected),
                    "{} {} in octave {}",
                    root,
                    template.key,
                    octave
                );
            }
        }
    }
}

#[test]
fn test_recognize_c_major_and_c_minor() {
    let major = chord::recognize(&[pitch("C4"), pitch("E4"), pitch("G4")]);
    assert_eq!(major.label(), "C");
    let minor = chord::recognize_text(&["C4", "D#4", "G4"]).unwrap();
    assert_eq!(minor.label(), "Cm");
    assert_eq!(minor.chord().map(|c| c.chord_type), Some(ChordType::Minor));
}

#[test]
fn test_unmatched_pitches_keep_their_spelling() {
    let result = chord::recognize_text(&["C4", "Db4", "D4"]).unwrap();
    assert_eq!(result, Recognition::Unrecognized("C4 Db4 D4".into()));
    assert_eq!(chord::recognize(&[]), Recognition::Empty);
    assert_eq!(chord::recognize(&[]).label(), "");
}

#[test]
fn test_symbol_and_key_generation_agree() {
    let from_symbol = Chord::parse_symbol("Am7").unwrap().pitches(4);
    let from_key = chord::generate("A", "minor7", 4).unwrap();
    assert_eq!(from_symbol, from_key);
    let names: Vec<String> = from_key.iter().map(|p| p.to_string()).collect();
    assert_eq!(names, ["A4", "C5", "E5", "G5"]);
}

#[test]
fn test_quarter_notes_fill_one_tonic_measure() {
    let comp = compose("C4 E4 G4 C5");
    assert_eq!(comp.measures().len(), 1);

    let measure = &comp.measures()[0];
    assert_eq!(measure.label(), "C");
    assert_eq!(measure.accompaniment().degree.map(|d| d.to_string()), Some("I".into()));

    let blocks: Vec<(f64, Vec<String>)> = [0.0, 2.0]
        .iter()
        .map(|&t| {
            let pitches = measure
                .accompaniment()
                .notes
                .iter()
                .filter(|n| n.time == t)
                .map(|n| n.pitch.to_string())
                .collect();
            (t, pitches)
        })
        .collect();
    for (_, pitches) in &blocks {
        assert_eq!(pitches, &["C4", "E4", "G4"]);
    }
    assert_eq!(measure.accompaniment().notes.len(), 6);
}

#[test]
fn test_script_with_sharps_and_comments() {
    let comp = compose("# warm-up\nF#4 F#4 A#4 C#5 # all sharps\n");
    let measure = &comp.measures()[0];
    assert_eq!(measure.notes().len(), 4);
    assert_eq!(measure.notes()[0].pitch, pitch("Gb4"));
    // F# twice: not a C major degree, so tonic triad under an F# label.
    assert_eq!(measure.label(), "F#");
    assert_eq!(measure.accompaniment().chord_pitches[0], pitch("C4"));
}

#[test]
fn test_harmony_tie_breaks_on_lowest_pitch_class() {
    let comp = compose("A4:2 D4:2");
    let measure = &comp.measures()[0];
    assert_eq!(measure.label(), "DV");
    assert_eq!(measure.accompaniment().chord.map(|c| c.label()), Some("G".to_string()));
}

#[test]
fn test_huge_octave_is_an_error_not_a_crash() {
    assert!(chord::recognize_text(&["C999999999"]).is_err());
    let mut session = Session::default();
    assert!(parser::run(&mut session, "C4 C999999999").is_err());
}

#[test]
fn test_whole_note_clamps_in_three_four() {
    let comp = compose("time_signature: 3/4\nC4:4");
    assert_eq!(comp.measures().len(), 1);
    let note = comp.measures()[0].notes()[0];
    assert_eq!(note.time, 0.0);
    assert_eq!(note.duration, 3.0);
}

#[test]
fn test_measures_never_overflow() {
    let script = "\
duration: 0.5
C4 D4 E4 F4:2 G4:4 A4:0.25 B4:1
time_signature: 3/4
do re mi:2 fa:4 sol la:0.25 ti:2
time_signature: 2/4
C5:4 D5 E5:1 F5:2
";
    let comp = compose(script);
    for measure in comp.measures() {
        for note in measure.notes() {
            assert!(note.end() <= measure.capacity(), "{:?} in {}", note, measure.capacity());
        }
    }
}

#[test]
fn test_overflow_appends_exactly_one_measure() {
    let mut comp = Composition::default();
    comp.insert(pitch("C4"), 2.0).unwrap();
    comp.insert(pitch("D4"), 1.0).unwrap();
    let before = comp.measures().len();
    comp.insert(pitch("E4"), 4.0).unwrap();
    assert_eq!(comp.measures().len(), before + 1);
}

#[test]
fn test_deleting_only_measure_leaves_one_empty() {
    let mut comp = compose("C4 E4");
    assert!(comp.delete_measure(0).is_some());
    assert_eq!(comp.measures().len(), 1);
    assert!(comp.measures()[0].is_empty());
    assert!(comp.delete_measure(3).is_none());
}

#[test]
fn test_settings_file_drives_session() {
    let settings = Settings::parse("time_signature: 2/4\nduration: 2\noctave: 3\n").unwrap();
    let mut session = Session::new(settings);
    parser::run(&mut session, "do mi sol").unwrap();

    let comp = session.composition();
    assert_eq!(comp.time_signature(), TimeSignature::TwoFour);
    assert_eq!(comp.measures().len(), 3);
    assert_eq!(comp.measures()[2].notes()[0].pitch, pitch("G3"));
    let chord: Vec<String> = comp.measures()[2]
        .accompaniment()
        .chord_pitches
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(chord, ["G3", "B3", "D4"]);
}

#[test]
fn test_composition_serializes_for_display() {
    let comp = compose("C4 E4 G4 C5\nB4:4");
    let json = serde_json::to_value(&comp).unwrap();
    assert_eq!(json["timeSignature"], "4/4");
    assert_eq!(json["measures"][0]["accompaniment"]["label"], "C");
    assert_eq!(json["measures"][1]["accompaniment"]["degree"], "V");
    assert_eq!(json["measures"][1]["accompaniment"]["label"], "BV");
    assert_eq!(json["measures"][1]["accompaniment"]["chord"]["root"], "G");
    assert_eq!(json["measures"][1]["notes"][0]["pitch"], "B4");
    assert_eq!(json["cursor"]["measure"], 1);
}

#[test]
fn test_cancel_mid_measure_stops_before_next_event() {
    let comp = compose("C4 E4 G4 C5\nD4 F4 A4 D5");
    let transport = Transport::default();
    assert_eq!(transport.toggle(), Toggle::Started);

    let mut player = Player::new(ManualClock::cancelling_on_wait(1), ToneLog::default(), 1.0)
        .unwrap();
    let outcome = player.play_composition(&comp, &transport);
    let (clock, log) = player.into_parts();

    assert_eq!(outcome, PlaybackOutcome::Cancelled);
    // Melody C4 plus the first C-E-G block, all at beat 0.
    assert_eq!(log.tones.len(), 4);
    assert_eq!(clock.waits, [1.0]);
    assert!(!transport.is_playing());
}

#[test]
fn test_full_playback_paces_measures() {
    let comp = compose("C4:4\nG4:4");
    let transport = Transport::default();
    let mut player = Player::new(ManualClock::default(), ToneLog::default(), 2.0).unwrap();
    assert_eq!(player.play_composition(&comp, &transport), PlaybackOutcome::Finished);

    let (clock, log) = player.into_parts();
    // Each measure: 1 melody tone and two 3-note blocks.
    assert_eq!(log.tones.len(), 14);
    assert_eq!(clock.waits, [1.0, 1.0, 0.1, 1.0, 1.0]);
    assert!(log.tones.iter().all(|t| t.duration_secs <= 2.0));
}
