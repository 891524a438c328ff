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

mod error;
mod file;
mod resample;

pub use error::SourceError;
pub use file::FileSource;
pub use resample::Resampled;

/// A decoded audio stream.
pub trait Source: Send {
    /// Fills the buffer with interleaved samples and returns how many were written.
    /// Buffers should hold a whole number of frames. A short read means the stream
    /// ended; zero means it had already ended.
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, SourceError>;

    /// Number of interleaved channels.
    fn channel_count(&self) -> u16;

    /// Frames per second.
    fn sample_rate(&self) -> u32;

    /// Total length, if the container reports it.
    fn duration(&self) -> Option<Duration>;
}

/// Wraps the source in a resampler if its rate differs from the target rate.
pub fn resampled(
    source: Box<dyn Source>,
    target_rate: u32,
) -> Result<Box<dyn Source>, SourceError> {
    if source.sample_rate() == target_rate {
        return Ok(source);
    }
    Ok(Box::new(Resampled::new(source, target_rate)?))
}

/// A source backed by samples in memory.
#[cfg(test)]
pub struct MemorySource {
    samples: Vec<f32>,
    position: usize,
    channels: u16,
    sample_rate: u32,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> MemorySource {
        MemorySource {
            samples,
            position: 0,
            channels,
            sample_rate,
        }
    }
}

#[cfg(test)]
impl Source for MemorySource {
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, SourceError> {
        let count = buffer.len().min(self.samples.len() - self.position);
        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        let frames = self.samples.len() / self.channels as usize;
        Some(Duration::from_secs_f64(
            frames as f64 / self.sample_rate as f64,
        ))
    }
}
