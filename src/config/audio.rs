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
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The device name that selects the host's default output.
pub const DEFAULT_DEVICE: &str = "default";

/// How long the mock device plays each clip when no length is configured.
const DEFAULT_MOCK_CLIP_LENGTH_MS: u64 = 500;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Audio {
    /// The audio device. Names starting with "mock" select the mock device.
    device: String,

    /// Output sample rate in Hz. Defaults to the device's preferred rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,

    /// How long the mock device plays each clip, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mock_clip_length_ms: Option<u64>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            mock_clip_length_ms: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the requested sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns how long the mock device plays each clip.
    pub fn mock_clip_length(&self) -> Duration {
        Duration::from_millis(
            self.mock_clip_length_ms
                .unwrap_or(DEFAULT_MOCK_CLIP_LENGTH_MS),
        )
    }
}

impl Default for Audio {
    fn default() -> Audio {
        Audio::new(DEFAULT_DEVICE)
    }
}
