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
use std::io;
use std::path::PathBuf;
use std::thread;

use tokio::{
    sync::{mpsc::Sender, oneshot},
    task::JoinHandle,
};
use tracing::{info, span, warn, Level};

use super::Event;

const LIST: &str = "list";
const PLAY: &str = "play";
const STOP: &str = "stop";
const ADD: &str = "add";
const EDIT: &str = "edit";
const REMOVE: &str = "remove";
const SAVE: &str = "save";
const OPEN: &str = "open";
const SESSIONS: &str = "sessions";
const QUIT: &str = "quit";
const FORCE_QUIT: &str = "quit!";

/// A driver that reads commands typed on the terminal.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and handles a single line. Returns false once the reader is exhausted.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> io::Result<bool>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {} N, {}, {} CHORD = PATH, {} N CHORD = PATH, {} N, {} [PATH], {} PATH, {}, {}): ",
            LIST, PLAY, STOP, ADD, EDIT, REMOVE, SAVE, OPEN, SESSIONS, QUIT,
        )?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        if input.trim().is_empty() {
            return Ok(true);
        }

        match parse(&input) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?,
            None => {
                warn!(input = input.trim(), "Unrecognized input");
                writeln!(writer, "Unrecognized command: {}", input.trim())?;
            }
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one command line.
pub fn parse(input: &str) -> Option<Event> {
    let input = input.trim();
    let (command, rest) = match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    };

    match (command.to_lowercase().as_str(), rest) {
        (LIST, "") => Some(Event::List),
        (STOP, "") => Some(Event::Stop),
        (SESSIONS, "") => Some(Event::Sessions),
        (QUIT, "") => Some(Event::Quit { force: false }),
        (FORCE_QUIT, "") => Some(Event::Quit { force: true }),
        (PLAY, row) => row.parse().ok().map(Event::Play),
        (REMOVE, row) => row.parse().ok().map(Event::Remove),
        (SAVE, "") => Some(Event::Save(None)),
        (SAVE, path) => Some(Event::Save(Some(PathBuf::from(path)))),
        (OPEN, path) if !path.is_empty() => Some(Event::Open(PathBuf::from(path))),
        (ADD, binding) => {
            let (chord, path) = parse_binding(binding)?;
            Some(Event::Add { chord, path })
        }
        (EDIT, rest) => {
            let (row, binding) = rest.split_once(char::is_whitespace)?;
            let (chord, path) = parse_binding(binding)?;
            Some(Event::Edit {
                row: row.parse().ok()?,
                chord,
                path,
            })
        }
        _ => None,
    }
}

/// Splits `CHORD = PATH`. The path is everything after the first `=`.
fn parse_binding(binding: &str) -> Option<(String, PathBuf)> {
    let (chord, path) = binding.split_once('=')?;
    let (chord, path) = (chord.trim(), path.trim());
    if chord.is_empty() || path.is_empty() {
        return None;
    }
    Some((chord.to_string(), PathBuf::from(path)))
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        // Reading stdin can't be interrupted, so it gets a plain thread that won't hold
        // up the runtime when the controller finishes.
        let (done_tx, done_rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name("keyboard".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "keyboard driver");
                let _enter = span.enter();

                info!("Keyboard driver started.");
                let result = loop {
                    match Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout()) {
                        Ok(true) => {}
                        Ok(false) => {
                            info!("Keyboard input closed.");
                            let _ = events_tx.blocking_send(Event::Quit { force: false });
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    }
                };
                let _ = done_tx.send(result);
            });

        tokio::spawn(async move {
            spawned?;
            done_rx
                .await
                .unwrap_or_else(|_| Err(io::Error::other("keyboard thread exited")))
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use super::*;

    fn get_event(event: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(event.as_bytes());
        let writer = BufWriter::new(Vec::<u8>::new());
        assert!(Driver::monitor_io(&sender, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Some(Event::List), get_event("list\n")?);
        assert_eq!(Some(Event::Play(3)), get_event("play 3\n")?);
        assert_eq!(Some(Event::Stop), get_event("STOP")?);
        assert_eq!(Some(Event::Remove(2)), get_event("remove  2")?);
        assert_eq!(Some(Event::Sessions), get_event("sessions")?);
        assert_eq!(Some(Event::Quit { force: false }), get_event("quit")?);
        assert_eq!(Some(Event::Quit { force: true }), get_event("quit!")?);
        assert_eq!(None, get_event("unrecognized")?);
        assert_eq!(None, get_event("play three")?);
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_parse_bindings() {
        assert_eq!(
            Some(Event::Add {
                chord: "Ctrl + Alt + 1".to_string(),
                path: PathBuf::from("C:\\Sounds\\air horn.wav"),
            }),
            parse("add Ctrl + Alt + 1 = C:\\Sounds\\air horn.wav")
        );
        assert_eq!(
            Some(Event::Edit {
                row: 2,
                chord: "F5".to_string(),
                path: PathBuf::from("rimshot=1.mp3"),
            }),
            parse("edit 2 F5 = rimshot=1.mp3")
        );
        assert_eq!(None, parse("add Ctrl + A"));
        assert_eq!(None, parse("add = sound.wav"));
        assert_eq!(None, parse("edit two F5 = sound.wav"));
        assert_eq!(None, parse("open"));
    }

    #[test]
    fn test_parse_save_and_open() {
        assert_eq!(Some(Event::Save(None)), parse("save"));
        assert_eq!(
            Some(Event::Save(Some(PathBuf::from("boards/main.json")))),
            parse("save boards/main.json")
        );
        assert_eq!(
            Some(Event::Open(PathBuf::from("my board.json"))),
            parse("open my board.json")
        );
    }

    #[test]
    fn test_end_of_input() -> Result<(), io::Error> {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        let writer = BufWriter::new(Vec::<u8>::new());
        assert!(!Driver::monitor_io(&sender, BufReader::new(&b""[..]), writer)?);
        Ok(())
    }
}
