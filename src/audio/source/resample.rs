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

use rubato::{
    ResampleError, Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use super::{Source, SourceError};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Converts a source to a different sample rate with a sinc resampler.
///
/// The resampler's own delay is trimmed from the front of the output and the output is
/// cut at `ceil(input frames * ratio)`, so the converted stream has the same duration as
/// the original.
pub struct Resampled {
    source: Box<dyn Source>,
    resampler: SincFixedIn<f32>,
    channels: usize,
    source_rate: u32,
    target_rate: u32,

    /// Planar input waiting to be resampled.
    input: Vec<Vec<f32>>,
    /// Interleaved scratch buffer for reading from the source.
    read_buffer: Vec<f32>,
    /// Planar resampler output, reused between calls.
    output_scratch: Vec<Vec<f32>>,
    /// Interleaved output waiting to be read.
    output: Vec<f32>,
    output_position: usize,

    /// Output frames still to be discarded for the resampler delay.
    delay_remaining: usize,
    input_frames: u64,
    output_frames: u64,
    source_finished: bool,
    flushed: bool,
}

impl Resampled {
    pub fn new(source: Box<dyn Source>, target_rate: u32) -> Result<Resampled, SourceError> {
        let source_rate = source.sample_rate();
        let channels = source.channel_count() as usize;
        let ratio = target_rate as f64 / source_rate as f64;

        let sinc_params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler =
            SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, channels)
                .map_err(|_| SourceError::Resample(source_rate, target_rate))?;
        let output_scratch = resampler.output_buffer_allocate(true);
        let delay_remaining = resampler.output_delay();

        Ok(Resampled {
            source,
            resampler,
            channels,
            source_rate,
            target_rate,
            input: vec![Vec::with_capacity(INPUT_BLOCK_SIZE * 2); channels],
            read_buffer: vec![0.0; INPUT_BLOCK_SIZE * channels],
            output_scratch,
            output: Vec::new(),
            output_position: 0,
            delay_remaining,
            input_frames: 0,
            output_frames: 0,
            source_finished: false,
            flushed: false,
        })
    }

    /// Output frames this stream will produce in total, once the input length is known.
    fn expected_frames(&self) -> Option<u64> {
        let (source_rate, target_rate) = (self.source_rate as u64, self.target_rate as u64);
        self.source_finished
            .then(|| (self.input_frames * target_rate).div_ceil(source_rate))
    }

    /// Pulls from the source until the resampler has a full block or the source ends.
    fn fill_input(&mut self) -> Result<(), SourceError> {
        let needed = self.resampler.input_frames_next();
        while !self.source_finished && self.input[0].len() < needed {
            let frames = (needed - self.input[0].len()).min(INPUT_BLOCK_SIZE);
            let samples = frames * self.channels;
            let read = self.source.read(&mut self.read_buffer[..samples])?;

            for frame in self.read_buffer[..read].chunks_exact(self.channels) {
                for (channel, sample) in frame.iter().enumerate() {
                    self.input[channel].push(*sample);
                }
            }
            self.input_frames += (read / self.channels) as u64;
            if read < samples {
                self.source_finished = true;
            }
        }
        Ok(())
    }

    /// Runs the resampler once. Returns false when there's nothing left to produce.
    fn process(&mut self) -> Result<bool, SourceError> {
        self.fill_input()?;
        let (source_rate, target_rate) = (self.source_rate, self.target_rate);
        let error = move |_: ResampleError| SourceError::Resample(source_rate, target_rate);

        let needed = self.resampler.input_frames_next();
        let produced = if self.input[0].len() >= needed {
            let (consumed, produced) = self
                .resampler
                .process_into_buffer(&self.input, &mut self.output_scratch, None)
                .map_err(error)?;
            for channel in self.input.iter_mut() {
                channel.drain(..consumed);
            }
            produced
        } else if !self.input[0].is_empty() {
            let (_, produced) = self
                .resampler
                .process_partial_into_buffer(
                    Some(&self.input as &[Vec<f32>]),
                    &mut self.output_scratch,
                    None,
                )
                .map_err(error)?;
            for channel in self.input.iter_mut() {
                channel.clear();
            }
            produced
        } else if !self.flushed {
            // Push zeros through until the delayed tail of the signal is out.
            let (_, produced) = self
                .resampler
                .process_partial_into_buffer(
                    None::<&[Vec<f32>]>,
                    &mut self.output_scratch,
                    None,
                )
                .map_err(error)?;
            produced
        } else {
            return Ok(false);
        };

        self.push_output(produced);
        if self.source_finished && self.input[0].is_empty() {
            if let Some(expected) = self.expected_frames() {
                if self.output_frames >= expected {
                    self.flushed = true;
                }
            }
        }
        Ok(true)
    }

    /// Moves resampled frames into the interleaved output, dropping the delay at the
    /// start and anything past the expected length.
    fn push_output(&mut self, produced: usize) {
        if self.output_position >= self.output.len() {
            self.output.clear();
            self.output_position = 0;
        }

        for frame in 0..produced {
            if self.delay_remaining > 0 {
                self.delay_remaining -= 1;
                continue;
            }
            if let Some(expected) = self.expected_frames() {
                if self.output_frames >= expected {
                    break;
                }
            }
            for channel in &self.output_scratch {
                self.output.push(channel[frame]);
            }
            self.output_frames += 1;
        }
    }
}

impl Source for Resampled {
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, SourceError> {
        let mut written = 0;
        while written < buffer.len() {
            if self.output_position >= self.output.len() {
                if !self.process()? {
                    break;
                }
                continue;
            }

            let count = (buffer.len() - written).min(self.output.len() - self.output_position);
            buffer[written..written + count]
                .copy_from_slice(&self.output[self.output_position..self.output_position + count]);
            written += count;
            self.output_position += count;
        }
        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels as u16
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }
}
