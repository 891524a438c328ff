// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

use crate::hotkey::RegistrationId;
use crate::soundboard::{Binding, Soundboard};

pub mod hotkeys;
pub mod keyboard;

/// Controller events. Every user action and every fired hotkey arrives here, so the
/// soundboard is only ever touched from the controller task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Prints the board.
    List,

    /// Plays the sound in the given row.
    Play(usize),

    /// Stops everything that's playing.
    Stop,

    /// Adds a sound bound to the chord.
    Add { chord: String, path: PathBuf },

    /// Replaces the sound and chord in the given row.
    Edit {
        row: usize,
        chord: String,
        path: PathBuf,
    },

    /// Removes the given row.
    Remove(usize),

    /// Saves the board, optionally to a new file.
    Save(Option<PathBuf>),

    /// Replaces the board with the contents of a file.
    Open(PathBuf),

    /// Prints the sounds currently playing.
    Sessions,

    /// A global hotkey fired.
    Hotkey(RegistrationId),

    /// Stops the controller. Without force, refuses once if there are unsaved changes.
    Quit { force: bool },
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Whether the controller keeps going after an event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Runs the soundboard from driver events.
pub struct Controller {
    handle: JoinHandle<Soundboard>,
}

impl Controller {
    /// Creates a new controller fed by the given drivers. User-visible output goes to
    /// the writer.
    pub fn new(
        soundboard: Soundboard,
        drivers: Vec<Arc<dyn Driver>>,
        output: Box<dyn Write + Send>,
    ) -> Controller {
        Controller {
            handle: tokio::spawn(
                Controller::trigger_events(soundboard, drivers, output)
                    .instrument(span!(Level::INFO, "controller")),
            ),
        }
    }

    /// Join will block until the controller finishes. Returns the soundboard, which has
    /// already been shut down.
    pub async fn join(&mut self) -> Result<Soundboard, JoinError> {
        (&mut self.handle).await
    }

    async fn trigger_events(
        soundboard: Soundboard,
        drivers: Vec<Arc<dyn Driver>>,
        output: Box<dyn Write + Send>,
    ) -> Soundboard {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        // Drivers end on their own once the event channel closes.
        let _driver_handles: Vec<JoinHandle<Result<(), io::Error>>> = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();
        drop(events_tx);

        info!(sounds = soundboard.triggers().len(), "Controller started.");

        let mut state = State {
            soundboard,
            output,
            quit_requested: false,
        };
        while let Some(event) = events_rx.recv().await {
            info!(event = ?event, "Received event.");
            match state.handle(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => error!(err = %e, "Unable to write controller output"),
            }
        }

        info!("Controller closing.");
        state.soundboard.shutdown();
        state.soundboard
    }
}

struct State {
    soundboard: Soundboard,
    output: Box<dyn Write + Send>,
    /// Set when a quit was refused because of unsaved changes.
    quit_requested: bool,
}

impl State {
    fn handle(&mut self, event: Event) -> Result<Flow, io::Error> {
        let quit_requested = std::mem::take(&mut self.quit_requested);
        let soundboard = &mut self.soundboard;
        let out = &mut self.output;

        match event {
            Event::List => {
                if soundboard.triggers().is_empty() {
                    writeln!(out, "The board is empty.")?;
                }
                for (index, trigger) in soundboard.triggers().iter().enumerate() {
                    let row = index + 1;
                    let status = match (trigger.hotkey(), soundboard.registration(row)) {
                        (None, _) => "",
                        (Some(_), Ok(Some(_))) => "",
                        (Some(_), _) => " (inactive)",
                    };
                    writeln!(out, "{:>3}. {}{}", row, trigger, status)?;
                }
            }
            Event::Play(row) => match soundboard.play(row) {
                Ok(session) => writeln!(out, "Playing row {} (session {}).", row, session)?,
                Err(e) => report(out, e)?,
            },
            Event::Stop => {
                soundboard.stop_all();
                writeln!(out, "Stopped.")?;
            }
            Event::Add { chord, path } => match soundboard.add(&path, &chord) {
                Ok(binding) => {
                    let row = soundboard.triggers().len();
                    writeln!(out, "Added row {}.", row)?;
                    report_binding(out, row, &binding)?;
                }
                Err(e) => report(out, e)?,
            },
            Event::Edit { row, chord, path } => match soundboard.edit(row, &path, &chord) {
                Ok(binding) => {
                    writeln!(out, "Updated row {}.", row)?;
                    report_binding(out, row, &binding)?;
                }
                Err(e) => report(out, e)?,
            },
            Event::Remove(row) => match soundboard.remove(row) {
                Ok(trigger) => writeln!(out, "Removed {}.", trigger)?,
                Err(e) => report(out, e)?,
            },
            Event::Save(path) => match soundboard.save(path.as_deref()) {
                Ok(path) => writeln!(out, "Saved to {}.", path.display())?,
                Err(e) => report(out, e)?,
            },
            Event::Open(path) => match soundboard.open(&path) {
                Ok(bindings) => {
                    writeln!(
                        out,
                        "Opened {} with {} sounds.",
                        path.display(),
                        bindings.len()
                    )?;
                    for (index, binding) in bindings.iter().enumerate() {
                        report_binding(out, index + 1, binding)?;
                    }
                }
                Err(e) => report(out, e)?,
            },
            Event::Sessions => {
                let sessions = soundboard.pool().sessions();
                if sessions.is_empty() {
                    writeln!(out, "Nothing is playing.")?;
                }
                for session in sessions {
                    writeln!(
                        out,
                        "  {} {} ({:.1}s)",
                        session.id,
                        session.path.display(),
                        session.elapsed.as_secs_f64()
                    )?;
                }
            }
            Event::Hotkey(id) => match soundboard.on_hotkey(id) {
                Ok(Some(session)) => info!(id, session = %session, "Hotkey played sound"),
                Ok(None) => {}
                Err(e) => report(out, e)?,
            },
            Event::Quit { force } => {
                if force || quit_requested || !soundboard.is_dirty() {
                    return Ok(Flow::Quit);
                }
                self.quit_requested = true;
                writeln!(
                    out,
                    "There are unsaved changes. Save first, or quit again to discard them."
                )?;
            }
        }

        out.flush()?;
        Ok(Flow::Continue)
    }
}

/// Shows a failed operation to the user. None of these stop the controller.
fn report<E: std::error::Error>(out: &mut impl Write, e: E) -> Result<(), io::Error> {
    warn!(err = %e, "Soundboard operation failed");
    writeln!(out, "Error: {}", e)
}

fn report_binding(out: &mut impl Write, row: usize, binding: &Binding) -> Result<(), io::Error> {
    if let Binding::Inert(e) = binding {
        writeln!(out, "Warning: row {}: {}", row, e)?;
    }
    Ok(())
}
