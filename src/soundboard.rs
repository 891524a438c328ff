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

//! The trigger list and the glue between it, the hotkey registry and the playback pool.
//! Rows are numbered from 1, the way they're shown to the user.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::board::{self, BoardError, SoundTrigger};
use crate::hotkey::{self, HotkeyRegistry, RegistrationError, RegistrationId};
use crate::playback::{PlaybackError, PlaybackPool, SessionId};

#[derive(Debug, thiserror::Error)]
pub enum SoundboardError {
    #[error("there is no row {row}, the board has {rows} sounds")]
    BadRow { row: usize, rows: usize },

    #[error("a sound file is required")]
    MissingFile,

    #[error("a hotkey is required")]
    MissingHotkey,

    #[error("the board hasn't been saved before, a file name is required")]
    NoBoardPath,

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Board(#[from] BoardError),
}

/// The outcome of binding a trigger's chord. A trigger whose chord couldn't be
/// registered stays on the board, it just won't fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Active(RegistrationId),
    Inert(RegistrationError),
    Unbound,
}

impl Binding {
    pub fn is_active(&self) -> bool {
        matches!(self, Binding::Active(_))
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Active(id) => write!(f, "active (id {})", id),
            Binding::Inert(e) => write!(f, "inactive: {}", e),
            Binding::Unbound => write!(f, "no hotkey"),
        }
    }
}

pub struct Soundboard {
    triggers: Vec<SoundTrigger>,
    registry: HotkeyRegistry,
    pool: PlaybackPool,
    board_path: Option<PathBuf>,
    dirty: bool,
}

impl Soundboard {
    pub fn new(registry: HotkeyRegistry, pool: PlaybackPool) -> Soundboard {
        Soundboard {
            triggers: Vec::new(),
            registry,
            pool,
            board_path: None,
            dirty: false,
        }
    }

    pub fn triggers(&self) -> &[SoundTrigger] {
        &self.triggers
    }

    pub fn pool(&self) -> &PlaybackPool {
        &self.pool
    }

    pub fn board_path(&self) -> Option<&Path> {
        self.board_path.as_deref()
    }

    /// True if the trigger list changed since it was last opened or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The registration currently held by the trigger in the given row.
    pub fn registration(&self, row: usize) -> Result<Option<RegistrationId>, SoundboardError> {
        let index = self.index(row)?;
        Ok(self.registry.registration(self.triggers[index].id()))
    }

    /// Appends a trigger and binds its chord.
    pub fn add(&mut self, file_path: &Path, chord: &str) -> Result<Binding, SoundboardError> {
        validate(file_path, chord)?;

        let trigger = SoundTrigger::new(file_path, Some(chord));
        let binding = self.bind(&trigger);
        info!(trigger = %trigger, row = self.triggers.len() + 1, "Added sound");
        self.triggers.push(trigger);
        self.dirty = true;
        Ok(binding)
    }

    /// Replaces the file and chord of an existing trigger and rebinds it.
    pub fn edit(
        &mut self,
        row: usize,
        file_path: &Path,
        chord: &str,
    ) -> Result<Binding, SoundboardError> {
        let index = self.index(row)?;
        validate(file_path, chord)?;

        let trigger = &mut self.triggers[index];
        self.registry.unregister(trigger.id());
        trigger.set_file_path(file_path);
        trigger.set_hotkey(Some(chord));

        let trigger = self.triggers[index].clone();
        let binding = self.bind(&trigger);
        info!(trigger = %trigger, row, "Edited sound");
        self.dirty = true;
        Ok(binding)
    }

    /// Removes a trigger, releasing its hotkey. Sounds it started keep playing.
    pub fn remove(&mut self, row: usize) -> Result<SoundTrigger, SoundboardError> {
        let index = self.index(row)?;
        self.registry.unregister(self.triggers[index].id());
        let trigger = self.triggers.remove(index);
        info!(trigger = %trigger, row, "Removed sound");
        self.dirty = true;
        Ok(trigger)
    }

    /// Plays the sound in the given row on top of anything already playing.
    pub fn play(&self, row: usize) -> Result<SessionId, SoundboardError> {
        let index = self.index(row)?;
        Ok(self.pool.play(self.triggers[index].file_path())?)
    }

    pub fn stop_all(&self) {
        self.pool.stop_all();
    }

    /// Plays whatever trigger a fired hotkey is bound to. Stale or unknown ids play
    /// nothing and return None.
    pub fn on_hotkey(&self, id: RegistrationId) -> Result<Option<SessionId>, SoundboardError> {
        let Some(trigger_id) = self.registry.dispatch(id) else {
            return Ok(None);
        };
        let Some(trigger) = self.triggers.iter().find(|t| t.id() == trigger_id) else {
            warn!(id, trigger = %trigger_id, "Hotkey bound to a trigger that no longer exists");
            return Ok(None);
        };
        Ok(Some(self.pool.play(trigger.file_path())?))
    }

    /// Replaces the board with the contents of a board file. If the file can't be
    /// loaded the current board is left as it was. Returns the binding of each row.
    pub fn open(&mut self, path: &Path) -> Result<Vec<Binding>, SoundboardError> {
        let triggers = board::load(path)?;

        self.registry.unregister_all();
        let mut bindings = Vec::with_capacity(triggers.len());
        for trigger in &triggers {
            bindings.push(self.bind(trigger));
        }
        self.triggers = triggers;

        info!(
            path = %path.display(),
            sounds = self.triggers.len(),
            active = bindings.iter().filter(|b| b.is_active()).count(),
            "Opened soundboard"
        );
        self.board_path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(bindings)
    }

    /// Writes the board to the given file, or to the file it was last opened from or
    /// saved to. Returns the path written.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf, SoundboardError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| self.board_path.clone())
            .ok_or(SoundboardError::NoBoardPath)?;

        board::save(&path, &self.triggers)?;
        info!(path = %path.display(), sounds = self.triggers.len(), "Saved soundboard");
        self.board_path = Some(path.clone());
        self.dirty = false;
        Ok(path)
    }

    /// Stops every sound and releases every hotkey.
    pub fn shutdown(&mut self) {
        self.pool.stop_all();
        self.registry.unregister_all();
    }

    fn bind(&mut self, trigger: &SoundTrigger) -> Binding {
        if trigger.hotkey().is_none() {
            return Binding::Unbound;
        }
        match self.registry.register(trigger) {
            Ok(id) => Binding::Active(id),
            Err(e) => {
                warn!(trigger = %trigger, err = %e, "Hotkey is inactive");
                Binding::Inert(e)
            }
        }
    }

    fn index(&self, row: usize) -> Result<usize, SoundboardError> {
        if row == 0 || row > self.triggers.len() {
            return Err(SoundboardError::BadRow {
                row,
                rows: self.triggers.len(),
            });
        }
        Ok(row - 1)
    }
}

fn validate(file_path: &Path, chord: &str) -> Result<(), SoundboardError> {
    if file_path.as_os_str().is_empty() {
        return Err(SoundboardError::MissingFile);
    }
    if hotkey::normalize(chord).is_empty() {
        return Err(SoundboardError::MissingHotkey);
    }
    Ok(())
}
