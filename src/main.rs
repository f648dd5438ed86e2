mod repl;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clichord::chord::{self, Chord, Recognition};
use clichord::composer::{Composition, Session};
use clichord::parser;
use clichord::scheduler::{
    ManualClock, PlaybackOutcome, Player, SystemClock, Toggle, Transport, build_schedule,
    measure_offsets,
};
use clichord::settings::Settings;
use clichord::synth::{AudioEngine, ToneLog};

#[derive(Parser)]
#[command(name = "clichord", about = "Chord naming, rhythm composing and accompaniment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Name the chord formed by a set of notes
    Chord {
        /// Notes such as C4 Eb4 G4
        #[arg(required = true)]
        notes: Vec<String>,
    },

    /// Spell out a chord from a symbol (Cmaj7) or a root and a type (C major7)
    Build {
        /// Chord symbol, or the root when a type follows
        root: String,

        /// Chord type key or suffix (major, m7, dim, ...)
        chord_type: Option<String>,

        /// Octave the root is voiced in
        #[arg(long, default_value_t = 4, allow_negative_numbers = true)]
        octave: i32,
    },

    /// Build measures and accompaniment from a .compose file
    Compose {
        /// Path to a .compose file
        file: PathBuf,

        /// Print the composition as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Play a .compose file with its accompaniment
    Play {
        /// Path to a .compose file
        file: PathBuf,

        /// Print the schedule instead of making sound
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Interactive keyboard composer
    Live {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Settings sources. Flags win over the settings file.
#[derive(Args)]
struct Overrides {
    /// Start from a .settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// 2/4, 3/4 or 4/4
    #[arg(long)]
    time_signature: Option<String>,

    /// Beats per entered note: 0.25, 0.5, 1, 2 or 4
    #[arg(long)]
    duration: Option<String>,

    /// Playback speed, 0.5 to 2
    #[arg(long)]
    speed: Option<String>,

    /// Octave for entry and accompaniment: 3, 4 or 5
    #[arg(long)]
    octave: Option<String>,
}

impl Overrides {
    fn resolve(&self) -> Settings {
        let mut settings = match &self.settings {
            Some(path) => Settings::load(path).unwrap_or_else(|e| fail(&e.to_string())),
            None => Settings::default(),
        };

        let flags = [
            ("time_signature", &self.time_signature),
            ("duration", &self.duration),
            ("speed", &self.speed),
            ("octave", &self.octave),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                settings
                    .apply(key, value)
                    .unwrap_or_else(|e| fail(&e.to_string()));
            }
        }
        settings
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Chord { notes } => {
            let recognition =
                chord::recognize_text(&notes).unwrap_or_else(|e| fail(&e.to_string()));
            match recognition {
                Recognition::Chord(c) => println!("{} ({})", c, c.chord_type.template().key),
                other => println!("{}", other),
            }
        }
        Command::Build {
            root,
            chord_type,
            octave,
        } => {
            let pitches = match chord_type {
                Some(kind) => chord::generate(&root, &kind, octave),
                None => Chord::parse_symbol(&root).map(|c| c.pitches(octave)),
            }
            .unwrap_or_else(|e| fail(&e.to_string()));
            let spelled: Vec<String> = pitches.iter().map(|p| p.to_string()).collect();
            println!("{}", spelled.join(" "));
        }
        Command::Compose {
            file,
            json,
            overrides,
        } => {
            let settings = overrides.resolve();
            let comp = load_composition(&file, settings);
            if json {
                let doc = serde_json::json!({
                    "settings": settings,
                    "composition": comp,
                });
                match serde_json::to_string_pretty(&doc) {
                    Ok(text) => println!("{}", text),
                    Err(e) => fail(&format!("failed to serialize composition: {}", e)),
                }
            } else {
                print_composition(&comp);
            }
        }
        Command::Play {
            file,
            dry_run,
            overrides,
        } => {
            let settings = overrides.resolve();
            let comp = load_composition(&file, settings);

            println!(
                "Playing: {} measures, {} time, speed {}x",
                comp.measures().len(),
                comp.time_signature(),
                settings.speed
            );
            println!();

            if dry_run {
                print_schedule(&comp, settings.speed);
            } else if let Err(e) = play(comp, settings.speed) {
                fail(&format!("Playback error: {}", e));
            }
        }
        Command::Live { overrides } => {
            if let Err(e) = repl::run(overrides.resolve()) {
                fail(&format!("Live mode error: {}", e));
            }
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn load_composition(path: &Path, settings: Settings) -> Composition {
    let input = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Error reading {}: {}", path.display(), e)));
    let mut session = Session::new(settings);
    if let Err(e) = parser::run(&mut session, &input) {
        fail(&format!("Parse error: {}", e));
    }
    session.into_composition()
}

fn print_composition(comp: &Composition) {
    println!("Time signature: {}", comp.time_signature());
    println!("Accompaniment octave: {}", comp.accompaniment_octave());
    println!("Measures: {}", comp.measures().len());
    println!();
    for (i, measure) in comp.measures().iter().enumerate() {
        let accompaniment = measure.accompaniment();
        match accompaniment.degree {
            Some(degree) => println!(
                "--- Measure {} [{}] {} ({}) ---",
                i + 1,
                measure.label(),
                degree.chord(),
                degree
            ),
            None => println!("--- Measure {} (empty) ---", i + 1),
        }
        println!(
            "  Filled: {}/{} beats",
            measure.filled_beats(),
            measure.capacity()
        );
        for note in measure.notes() {
            println!(
                "  {:<4} at beat {:<5} for {} beat{}",
                note.pitch.to_string(),
                note.time,
                note.duration,
                if note.duration != 1.0 { "s" } else { "" }
            );
        }

        // Block chords share a start time; print one line per block.
        let mut blocks: Vec<(f64, f64, Vec<String>)> = Vec::new();
        for n in &accompaniment.notes {
            match blocks.last_mut() {
                Some((time, _, pitches)) if *time == n.time => pitches.push(n.pitch.to_string()),
                _ => blocks.push((n.time, n.duration, vec![n.pitch.to_string()])),
            }
        }
        for (time, duration, pitches) in blocks {
            println!(
                "  Chord [{}] at beat {} for {}",
                pitches.join(" "),
                time,
                duration
            );
        }
        println!();
    }
}

/// Run playback without sound and print when each tone would start.
fn print_schedule(comp: &Composition, speed: f64) {
    let (starts, _) = measure_offsets(comp, speed);
    for ((i, measure), offset) in comp.measures().iter().enumerate().zip(starts) {
        if measure.is_empty() {
            continue;
        }
        println!("--- Measure {} [{}] ---", i + 1, measure.label());
        for event in build_schedule(measure) {
            println!(
                "  {:>7.2}s  {:<4} {:>5.2}s  {:?}",
                offset + event.time / speed,
                event.pitch.to_string(),
                event.duration / speed,
                event.part
            );
        }
    }

    let mut player = Player::new(ManualClock::default(), ToneLog::default(), speed)
        .unwrap_or_else(|e| fail(&e.to_string()));
    let outcome = player.play_composition(comp, &Transport::default());
    let (clock, log) = player.into_parts();
    println!();
    println!(
        "{} tones over {:.2}s ({:?})",
        log.tones.len(),
        clock.elapsed(),
        outcome
    );
}

/// Play through the speakers. Esc, q, space or Ctrl-C stops early.
fn play(comp: Composition, speed: f64) -> Result<(), String> {
    let engine = AudioEngine::new().map_err(|e| e.to_string())?;
    let mut player = Player::new(SystemClock, engine.sender(), speed).map_err(|e| e.to_string())?;

    let transport = Transport::default();
    if transport.toggle() != Toggle::Started {
        return Err("transport already running".into());
    }
    let shared = transport.clone();
    let handle = thread::spawn(move || player.play_composition(&comp, &shared));

    let raw = terminal::enable_raw_mode().is_ok();
    while !handle.is_finished() {
        if raw && stop_requested() {
            transport.stop();
        }
        if !raw {
            thread::sleep(Duration::from_millis(50));
        }
    }
    if raw {
        let _ = terminal::disable_raw_mode();
    }

    let outcome = handle
        .join()
        .map_err(|_| "playback thread panicked".to_string())?;
    if outcome == PlaybackOutcome::Cancelled {
        engine.silence();
        println!("Stopped.");
    }
    info!("playback finished: {:?}", outcome);
    Ok(())
}

fn stop_requested() -> bool {
    if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
        return false;
    }
    match event::read() {
        Ok(Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        })) => match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char(' ') => true,
            KeyCode::Char('c') => modifiers.contains(KeyModifiers::CONTROL),
            _ => false,
        },
        _ => false,
    }
}
