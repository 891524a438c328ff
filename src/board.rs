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

//! Board files: the configured trigger list, stored as a JSON array of
//! `{"FilePath", "Hotkey", "MIDIHotkey"}` records.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod trigger;

pub use trigger::{SoundTrigger, TriggerId};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("soundboard file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unable to access soundboard file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("soundboard file {} is invalid: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("soundboard file {} is empty", .0.display())]
    Empty(PathBuf),
}

/// A single record as it appears on disk.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Record {
    file_path: String,

    /// Derived from the path. Written for readers that display it, ignored on load.
    #[serde(default, skip_deserializing)]
    file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    hotkey: Option<String>,

    #[serde(
        rename = "MIDIHotkey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    midi_hotkey: Option<String>,
}

impl From<&SoundTrigger> for Record {
    fn from(trigger: &SoundTrigger) -> Record {
        Record {
            file_path: trigger.file_path().to_string_lossy().to_string(),
            file_name: trigger.file_name(),
            hotkey: trigger.hotkey().map(str::to_string),
            midi_hotkey: trigger.midi_hotkey().map(str::to_string),
        }
    }
}

impl From<Record> for SoundTrigger {
    fn from(record: Record) -> SoundTrigger {
        SoundTrigger::new(record.file_path, record.hotkey.as_deref())
            .with_midi_hotkey(record.midi_hotkey)
    }
}

/// Loads the triggers stored in a board file. Every loaded trigger gets a fresh id.
pub fn load(path: &Path) -> Result<Vec<SoundTrigger>, BoardError> {
    if !path.is_file() {
        return Err(BoardError::NotFound(path.to_path_buf()));
    }

    let contents = fs::read_to_string(path).map_err(|source| BoardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Option<Vec<Record>> =
        serde_json::from_str(&contents).map_err(|source| BoardError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
    let records = records.ok_or_else(|| BoardError::Empty(path.to_path_buf()))?;

    debug!(path = %path.display(), triggers = records.len(), "Loaded soundboard file");
    Ok(records.into_iter().map(SoundTrigger::from).collect())
}

/// Writes the triggers to a board file, replacing it. Absent chords are omitted.
pub fn save(path: &Path, triggers: &[SoundTrigger]) -> Result<(), BoardError> {
    let records: Vec<Record> = triggers.iter().map(Record::from).collect();
    let json = serde_json::to_string_pretty(&records).map_err(|source| BoardError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| BoardError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| BoardError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), triggers = triggers.len(), "Saved soundboard file");
    Ok(())
}
