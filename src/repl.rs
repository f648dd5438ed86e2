use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use tracing::{info, warn};

use clichord::NoteName;
use clichord::composer::Session;
use clichord::parser::char_to_note;
use clichord::scheduler::{MELODY_VOLUME, Player, SystemClock, Toggle, Transport};
use clichord::settings::{MAX_SPEED, MIN_SPEED, NOTE_DURATIONS, Settings, TimeSignature};
use clichord::synth::{AudioEngine, ToneSender, play_tone};

/// Keys that pick the note length, matching NOTE_DURATIONS in order.
const DURATION_KEYS: [char; 5] = ['z', 'x', 'c', 'v', 'b'];

const SPEED_STEP: f64 = 0.25;

/// Measures shown at once; older ones scroll off the top.
const VISIBLE_MEASURES: usize = 8;

/// Run the interactive composer
pub fn run(settings: Settings) -> Result<(), String> {
    let mut engine = AudioEngine::new().map_err(|e| e.to_string())?;

    let mut stdout = io::stdout();

    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    execute!(stdout, EnterAlternateScreen).map_err(|e| format!("alternate screen: {}", e))?;

    let mut live = Live::new(settings);
    live.draw(&mut stdout);

    let result = event_loop(&mut live, &mut engine, &mut stdout);

    live.transport.stop();
    live.join_playback();
    engine.silence();

    let _ = execute!(stdout, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

struct Live {
    session: Session,
    transport: Transport,
    playback: Option<JoinHandle<()>>,
    status: String,
}

impl Live {
    fn new(settings: Settings) -> Self {
        Self {
            session: Session::new(settings),
            transport: Transport::default(),
            playback: None,
            status: String::new(),
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.session.set(key, value) {
            Ok(()) => self.status = format!("{} set to {}", key, value),
            Err(e) => self.status = e.to_string(),
        }
    }

    fn key(&mut self, c: char, engine: &mut AudioEngine) {
        if let Some(digit) = c.to_digit(10) {
            self.set("octave", &digit.to_string());
            return;
        }

        if let Some(idx) = DURATION_KEYS.iter().position(|&k| k == c) {
            self.set("duration", &NOTE_DURATIONS[idx].to_string());
            return;
        }

        match c {
            'm' => {
                let next = match self.session.settings().time_signature {
                    TimeSignature::TwoFour => TimeSignature::ThreeFour,
                    TimeSignature::ThreeFour => TimeSignature::FourFour,
                    TimeSignature::FourFour => TimeSignature::TwoFour,
                };
                self.set("time_signature", &next.to_string());
            }
            '-' | '=' => {
                let step = if c == '-' { -SPEED_STEP } else { SPEED_STEP };
                let speed = (self.session.settings().speed + step).clamp(MIN_SPEED, MAX_SPEED);
                self.set("speed", &speed.to_string());
            }
            'r' => {
                self.session.reset();
                self.status = "composition cleared".into();
            }
            _ => {
                if let Some((name, octave_offset)) = char_to_note(c) {
                    self.enter(name, octave_offset, engine);
                }
            }
        }
    }

    fn enter(&mut self, name: NoteName, octave_offset: i32, engine: &mut AudioEngine) {
        match self.session.enter_name(name, octave_offset, None) {
            Ok(note) => {
                let speed = self.session.settings().speed;
                play_tone(engine, note.pitch, note.duration / speed, MELODY_VOLUME);
                self.status = format!("{} for {} beat(s)", note.pitch, note.duration);
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    fn delete_current(&mut self) {
        let index = self.session.composition().cursor().measure;
        if self.session.delete_measure(index).is_some() {
            self.status = format!("deleted measure {}", index + 1);
        }
    }

    fn toggle_playback(&mut self, sender: ToneSender) {
        if !self.transport.is_playing() {
            // Join the last run before arming the transport again.
            self.join_playback();
        }

        let speed = self.session.settings().speed;
        let mut player = match Player::new(SystemClock, sender, speed) {
            Ok(player) => player,
            Err(e) => {
                self.status = e.to_string();
                return;
            }
        };

        match self.transport.toggle() {
            Toggle::Started => {
                let composition = self.session.composition().clone();
                let transport = self.transport.clone();
                info!("live playback of {} measures", composition.measures().len());
                self.playback = Some(thread::spawn(move || {
                    player.play_composition(&composition, &transport);
                }));
                self.status = "playing".into();
            }
            Toggle::Stopped => self.status = "stopping".into(),
        }
    }

    fn join_playback(&mut self) {
        if let Some(handle) = self.playback.take() {
            if handle.join().is_err() {
                warn!("playback thread panicked");
            }
        }
    }

    /// Collect a playback thread that ran to completion. Returns whether
    /// anything changed on screen.
    fn reap_playback(&mut self) -> bool {
        if self.playback.as_ref().is_some_and(|h| h.is_finished()) {
            self.join_playback();
            self.status = "stopped".into();
            return true;
        }
        false
    }

    fn draw(&self, stdout: &mut io::Stdout) {
        let banner = "\x1b[2J\x1b[H\
clichord live - compose with the keyboard\r\n\
─────────────────────────────────────────\r\n\
\r\n\
  Natural notes:  a s d f g h j k l ; '\r\n\
                  C D E F G A B C D E F\r\n\
\r\n\
  Sharps/flats:   w e   t y u   o p\r\n\
                  C# D#  F# G# A#  C# D#\r\n\
\r\n\
  Length:         z x c v b  (1/4 1/2 1 2 4 beats)\r\n\
  Octave (3-5):   number keys      Time signature: m\r\n\
  Speed:          - =              Play/stop: space\r\n\
  Delete measure: backspace        Reset: r    Quit: Esc\r\n\
\r\n";
        let _ = write!(stdout, "{}", banner);

        let settings = self.session.settings();
        let _ = write!(
            stdout,
            "  Time {}  |  Length {}  |  Speed {}x  |  Octave {}  |  {}\r\n\r\n",
            settings.time_signature,
            settings.note_duration,
            settings.speed,
            settings.octave,
            if self.transport.is_playing() { "Playing" } else { "Stopped" },
        );

        let composition = self.session.composition();
        let cursor = composition.cursor();
        let start = composition.measures().len().saturating_sub(VISIBLE_MEASURES);
        for (i, measure) in composition.measures().iter().enumerate().skip(start) {
            let marker = if i == cursor.measure { '>' } else { ' ' };
            let notes: Vec<String> = measure
                .notes()
                .iter()
                .map(|n| format!("{}:{}", n.pitch, n.duration))
                .collect();
            let _ = write!(
                stdout,
                "{} {:>3} [{:<4}] {}/{}  {}\r\n",
                marker,
                i + 1,
                measure.label(),
                measure.filled_beats(),
                measure.capacity(),
                notes.join(" "),
            );
        }

        let _ = write!(stdout, "\r\n  {}\r\n", self.status);
        let _ = stdout.flush();
    }
}

fn event_loop(
    live: &mut Live,
    engine: &mut AudioEngine,
    stdout: &mut io::Stdout,
) -> Result<(), String> {
    loop {
        if !event::poll(Duration::from_millis(50))
            .map_err(|e| format!("event poll error: {}", e))?
        {
            if live.reap_playback() {
                live.draw(stdout);
            }
            continue;
        }

        let ev = event::read().map_err(|e| format!("event read error: {}", e))?;

        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = ev
        else {
            continue;
        };

        match code {
            KeyCode::Esc => return Ok(()),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Char(' ') => live.toggle_playback(engine.sender()),
            KeyCode::Backspace => live.delete_current(),
            KeyCode::Char(c) => live.key(c, engine),
            _ => continue,
        }
        live.draw(stdout);
    }
}
