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
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::hotkey;

/// Global trigger ID counter.
static NEXT_TRIGGER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a sound trigger. Assigned once at creation and never reused, so it
/// stays valid while the trigger's file or chord is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(u64);

impl TriggerId {
    fn next() -> TriggerId {
        TriggerId(NEXT_TRIGGER_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A configured association between an audio file and, optionally, a hotkey chord.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundTrigger {
    id: TriggerId,
    file_path: PathBuf,
    /// Canonical chord, see [hotkey::normalize].
    hotkey: Option<String>,
    /// Carried through persistence only.
    midi_hotkey: Option<String>,
}

impl SoundTrigger {
    /// Creates a new trigger with a fresh id. The chord is normalized; a blank chord
    /// leaves the trigger without a hotkey.
    pub fn new<P: Into<PathBuf>>(file_path: P, hotkey: Option<&str>) -> SoundTrigger {
        SoundTrigger {
            id: TriggerId::next(),
            file_path: file_path.into(),
            hotkey: canonical(hotkey),
            midi_hotkey: None,
        }
    }

    /// Sets the MIDI chord carried alongside this trigger.
    pub fn with_midi_hotkey(mut self, midi_hotkey: Option<String>) -> SoundTrigger {
        self.midi_hotkey = midi_hotkey.filter(|midi| !midi.trim().is_empty());
        self
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// The file name portion of the path, used for display.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    pub fn hotkey(&self) -> Option<&str> {
        self.hotkey.as_deref()
    }

    pub fn midi_hotkey(&self) -> Option<&str> {
        self.midi_hotkey.as_deref()
    }

    pub fn set_file_path<P: Into<PathBuf>>(&mut self, file_path: P) {
        self.file_path = file_path.into();
    }

    /// Replaces the chord, normalizing it.
    pub fn set_hotkey(&mut self, hotkey: Option<&str>) {
        self.hotkey = canonical(hotkey);
    }
}

impl fmt::Display for SoundTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]",
            self.file_name(),
            self.hotkey.as_deref().unwrap_or("no hotkey")
        )
    }
}

fn canonical(hotkey: Option<&str>) -> Option<String> {
    hotkey
        .map(hotkey::normalize)
        .filter(|canonical| !canonical.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let first = SoundTrigger::new("a.wav", Some("Ctrl + A"));
        let second = SoundTrigger::new("a.wav", Some("Ctrl + A"));
        assert_ne!(first.id(), second.id());
        assert_eq!(first.id(), first.clone().id());
    }

    #[test]
    fn test_hotkey_is_normalized() {
        let mut trigger = SoundTrigger::new("sounds/airhorn.mp3", Some("f1 + alt+ctrl"));
        assert_eq!(Some("Ctrl + Alt + F1"), trigger.hotkey());
        assert_eq!("airhorn.mp3", trigger.file_name());

        let id = trigger.id();
        trigger.set_hotkey(Some("  "));
        assert_eq!(None, trigger.hotkey());
        trigger.set_hotkey(Some("shift+b"));
        assert_eq!(Some("Shift + B"), trigger.hotkey());
        assert_eq!(id, trigger.id());
    }

    #[test]
    fn test_display() {
        let trigger = SoundTrigger::new("/tmp/boom.wav", None);
        assert_eq!("boom.wav [no hotkey]", trigger.to_string());
    }
}
