// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeMap;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use soundboard::audio::{self, source::FileSource};
use soundboard::board;
use soundboard::config::{self, Audio, Settings};
use soundboard::controller::{hotkeys, keyboard, Controller, Driver};
use soundboard::hotkey::{self, Chord, HotkeyRegistry};
use soundboard::playback::PlaybackPool;
use soundboard::soundboard::{Binding, Soundboard};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A soundboard that plays clips on global hotkeys."
)]
struct Cli {
    /// The settings file. Defaults to settings.yaml in the user's config directory.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the soundboard, reading commands from the terminal.
    Start {
        /// The board to open. Defaults to the board used last time.
        board: Option<PathBuf>,
    },
    /// Plays the given files on top of each other and waits for them to finish.
    Play {
        /// The audio device to play through. Defaults to the configured device.
        #[arg(long)]
        device: Option<String>,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the canonical form of a hotkey chord and what it registers as.
    Chord {
        /// The chord, e.g. "alt+ctrl+f1".
        raw: String,
    },
    /// Checks that every sound on a board opens and every hotkey can be registered.
    Verify {
        /// The board file.
        board: PathBuf,
    },
    /// Writes a settings file with the default values.
    Init {
        /// Overwrite an existing settings file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings_path = match cli.settings {
        Some(path) => path,
        None => config::default_path().ok_or("unable to find the user config directory")?,
    };

    match cli.command {
        Commands::Start { board } => start(&settings_path, board).await?,
        Commands::Play { device, paths } => {
            let settings = Settings::load_or_default(&settings_path)?;
            let audio = match device {
                Some(device) => Audio::new(&device),
                None => settings.audio().clone(),
            };
            let pool = PlaybackPool::new(audio::get_device(&audio)?);
            for path in paths.iter() {
                let session = pool.play(path)?;
                println!("Playing {} (session {}).", path.display(), session);
            }

            while pool.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Chord { raw } => {
            let chord = Chord::parse(&raw);
            println!("Canonical: {}", chord);
            match chord.encode() {
                Ok((modifiers, key)) => {
                    println!("Modifiers: 0x{:04X}", modifiers.bits());
                    println!("Key: {}", key);
                }
                Err(e) => println!("Unable to register: {}", e),
            }
        }
        Commands::Verify { board } => verify(&board)?,
        Commands::Init { force } => {
            if settings_path.exists() && !force {
                return Err(format!(
                    "{} already exists, use --force to overwrite it",
                    settings_path.display()
                )
                .into());
            }
            Settings::default().save(&settings_path)?;
            println!("Wrote {}.", settings_path.display());
        }
    }

    Ok(())
}

/// Runs the interactive soundboard until the user quits.
async fn start(settings_path: &Path, board: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::load_or_default(settings_path)?;
    let device = audio::get_device(settings.audio())?;
    let (facility, fired_rx) = hotkey::get_facility(settings.hotkeys().backend())?;
    let mut soundboard = Soundboard::new(HotkeyRegistry::new(facility), PlaybackPool::new(device));

    if let Some(board) = board.or_else(|| settings.last_board().map(Path::to_path_buf)) {
        match soundboard.open(&board) {
            Ok(bindings) => {
                println!("Opened {} with {} sounds.", board.display(), bindings.len());
                for (index, binding) in bindings.iter().enumerate() {
                    if let Binding::Inert(e) = binding {
                        println!("Warning: row {}: {}", index + 1, e);
                    }
                }
            }
            Err(e) => println!("Starting with an empty board: {}", e),
        }
    }

    let drivers: Vec<Arc<dyn Driver>> = vec![
        Arc::new(keyboard::Driver::new()),
        Arc::new(hotkeys::Driver::new(fired_rx)),
    ];
    let soundboard = Controller::new(soundboard, drivers, Box::new(io::stdout()))
        .join()
        .await?;

    let board_path = soundboard.board_path().map(Path::to_path_buf);
    if board_path.is_some() && board_path.as_deref() != settings.last_board() {
        settings.set_last_board(board_path);
        settings.save(settings_path)?;
    }
    Ok(())
}

/// Reports sounds that won't open, chords that won't encode and chords used more than
/// once. Returns an error if anything was found.
fn verify(path: &Path) -> Result<(), Box<dyn Error>> {
    let triggers = board::load(path)?;
    let mut problems = 0;
    let mut chords: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    println!("Sounds (count: {}):", triggers.len());
    for (index, trigger) in triggers.iter().enumerate() {
        let row = index + 1;
        println!("{:>3}. {}", row, trigger);

        if let Err(e) = FileSource::open(trigger.file_path()) {
            println!("     {}", e);
            problems += 1;
        }
        match trigger.hotkey() {
            Some(chord) => {
                if let Err(e) = hotkey::encode(chord) {
                    println!("     {}", e);
                    problems += 1;
                }
                chords.entry(chord.to_string()).or_default().push(row);
            }
            None => println!("     no hotkey"),
        }
    }

    for (chord, rows) in chords.iter().filter(|(_, rows)| rows.len() > 1) {
        let rows: Vec<String> = rows.iter().map(usize::to_string).collect();
        println!(
            "Hotkey {} is used by rows {}, only the last one will fire.",
            chord,
            rows.join(", ")
        );
        problems += 1;
    }

    if problems > 0 {
        return Err(format!("{} problems found", problems).into());
    }
    println!("No problems found.");
    Ok(())
}
