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
use std::path::PathBuf;

/// Errors opening or decoding an audio source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unable to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt audio file {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("{} has no audio track", .0.display())]
    NoTrack(PathBuf),

    #[error("{} does not specify a sample rate", .0.display())]
    NoSampleRate(PathBuf),

    #[error("unable to determine the channel count of {}", .0.display())]
    NoChannels(PathBuf),

    #[error("decoding failed: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("resampling failed: {0}Hz -> {1}Hz")]
    Resample(u32, u32),
}
