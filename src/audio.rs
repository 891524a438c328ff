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
use std::{error::Error, fmt, path::Path, sync::Arc};

use crate::config;
use crate::playsync::CancelHandle;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod source;
mod thread_priority;

pub use source::{Source, SourceError};

/// Called exactly once when a started source stops playing, whether it ran to the end
/// or was cancelled. The source has already been dropped when this runs.
pub type FinishedCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no audio device found with name {0}")]
    NotFound(String),

    #[error("audio device {0} is no longer running")]
    Stopped(String),

    #[error("audio backend error: {0}")]
    Backend(String),
}

pub trait Device: fmt::Display + Send + Sync {
    /// Opens a decoder for the file, converted to whatever the device plays.
    fn open(&self, path: &Path) -> Result<Box<dyn Source>, SourceError>;

    /// Starts playing the source. Playback runs until the source ends or the cancel
    /// handle is cancelled, after which the source is dropped and `on_finished` is
    /// called from the device's own thread. If this returns an error the source has
    /// been dropped and `on_finished` will never be called.
    fn start(
        &self,
        source: Box<dyn Source>,
        cancel_handle: CancelHandle,
        on_finished: FinishedCallback,
    ) -> Result<(), DeviceError>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(
            mock::Device::get(device).with_clip_length(config.mock_clip_length()),
        ));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
