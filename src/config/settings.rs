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
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::audio::Audio;
use super::error::ConfigError;

/// Which global hotkey facility to use.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyBackend {
    /// The operating system's global hotkeys.
    #[default]
    Os,
    /// An in-process facility that accepts registrations but never fires.
    Mock,
}

/// A YAML representation of the hotkey configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Hotkeys {
    #[serde(default)]
    backend: HotkeyBackend,
}

impl Hotkeys {
    pub fn new(backend: HotkeyBackend) -> Hotkeys {
        Hotkeys { backend }
    }

    pub fn backend(&self) -> HotkeyBackend {
        self.backend
    }
}

/// Application settings.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    hotkeys: Hotkeys,

    /// The board opened at startup when none is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_board: Option<PathBuf>,
}

impl Settings {
    pub fn new(audio: Audio, hotkeys: Hotkeys) -> Settings {
        Settings {
            audio,
            hotkeys,
            last_board: None,
        }
    }

    /// Parse settings from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// Parse settings from a YAML file, falling back to defaults if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Settings, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Settings::default());
        }
        Settings::deserialize(path)
    }

    /// Writes the settings as YAML, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn hotkeys(&self) -> &Hotkeys {
        &self.hotkeys
    }

    pub fn last_board(&self) -> Option<&Path> {
        self.last_board.as_deref()
    }

    pub fn set_last_board(&mut self, board: Option<PathBuf>) {
        self.last_board = board;
    }
}

/// The default settings location: `<config dir>/soundboard/settings.yaml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soundboard").join("settings.yaml"))
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!("default", settings.audio().device());
        assert_eq!(None, settings.audio().sample_rate());
        assert_eq!(HotkeyBackend::Os, settings.hotkeys().backend());
        assert_eq!(None, settings.last_board());
    }

    #[test]
    fn test_parse() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.yaml");
        fs::write(
            &path,
            "audio:\n  device: mock-device\n  mock_clip_length_ms: 20\nhotkeys:\n  backend: mock\nlast_board: /boards/show.json\n",
        )?;

        let settings = Settings::deserialize(&path)?;
        assert_eq!("mock-device", settings.audio().device());
        assert_eq!(Duration::from_millis(20), settings.audio().mock_clip_length());
        assert_eq!(HotkeyBackend::Mock, settings.hotkeys().backend());
        assert_eq!(
            Some(Path::new("/boards/show.json")),
            settings.last_board()
        );
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "audio:\n  device: Speakers\n  sample_rate: 48000\n")?;

        let settings = Settings::deserialize(&path)?;
        assert_eq!("Speakers", settings.audio().device());
        assert_eq!(Some(48000), settings.audio().sample_rate());
        assert_eq!(HotkeyBackend::Os, settings.hotkeys().backend());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("settings.yaml");
        assert_eq!(Settings::default(), Settings::load_or_default(&path)?);

        let mut settings = Settings::new(Audio::new("mock"), Hotkeys::new(HotkeyBackend::Mock));
        settings.set_last_board(Some(dir.path().join("board.json")));
        settings.save(&path)?;

        assert_eq!(settings, Settings::load_or_default(&path)?);
        Ok(())
    }
}
