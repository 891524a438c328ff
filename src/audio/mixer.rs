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
// Core audio mixing logic, independent of any audio backend.
use tracing::warn;

use super::{FinishedCallback, Source};
use crate::playsync::CancelHandle;

/// A source being played by the mixer.
pub struct ActiveSource {
    /// Unique ID for this source
    pub id: u64,
    source: Box<dyn Source>,
    cancel_handle: CancelHandle,
    on_finished: Option<FinishedCallback>,
    /// Interleaved samples read from the source, reused between blocks.
    scratch: Vec<f32>,
}

impl ActiveSource {
    pub fn new(
        id: u64,
        source: Box<dyn Source>,
        cancel_handle: CancelHandle,
        on_finished: FinishedCallback,
    ) -> ActiveSource {
        ActiveSource {
            id,
            source,
            cancel_handle,
            on_finished: Some(on_finished),
            scratch: Vec::new(),
        }
    }

    /// Releases the decoder, then reports completion.
    fn finish(self) {
        let ActiveSource {
            source,
            on_finished,
            ..
        } = self;
        drop(source);
        if let Some(on_finished) = on_finished {
            on_finished();
        }
    }

    /// Reads up to `frames` frames and adds them into the output block. Returns false
    /// once the source has nothing more to give.
    fn mix_into(&mut self, output: &mut [f32], output_channels: usize, frames: usize) -> bool {
        let source_channels = self.source.channel_count() as usize;
        let wanted = frames * source_channels;
        if self.scratch.len() < wanted {
            self.scratch.resize(wanted, 0.0);
        }

        let mut read = 0;
        let mut more = true;
        while read < wanted {
            match self.source.read(&mut self.scratch[read..wanted]) {
                Ok(0) => {
                    more = false;
                    break;
                }
                Ok(count) => read += count,
                Err(e) => {
                    warn!(id = self.id, err = %e, "Audio source failed, stopping it");
                    more = false;
                    break;
                }
            }
        }

        let read_frames = read / source_channels;
        for (frame, samples) in self.scratch[..read_frames * source_channels]
            .chunks_exact(source_channels)
            .enumerate()
        {
            let out = &mut output[frame * output_channels..(frame + 1) * output_channels];
            adapt_channels(samples, out);
        }
        more && read == wanted
    }
}

/// Adds one source frame into one output frame. Mono sources feed every output
/// channel, a mono output takes the average of the source channels, and otherwise
/// channels line up by index with any extras on either side left out.
fn adapt_channels(source: &[f32], output: &mut [f32]) {
    if source.len() == 1 {
        output.iter_mut().for_each(|out| *out += source[0]);
    } else if output.len() == 1 {
        output[0] += source.iter().sum::<f32>() / source.len() as f32;
    } else {
        output
            .iter_mut()
            .zip(source.iter())
            .for_each(|(out, sample)| *out += *sample);
    }
}

/// Sums any number of sources into fixed-size interleaved blocks. Owned by a single
/// thread; sources are added by value and leave it when they finish or are cancelled.
pub struct Mixer {
    channels: u16,
    sources: Vec<ActiveSource>,
}

impl Mixer {
    /// Creates a new mixer producing the given number of output channels.
    pub fn new(channels: u16) -> Mixer {
        Mixer {
            channels,
            sources: Vec::new(),
        }
    }

    /// Adds a source. A source cancelled before it gets here finishes on the next block.
    pub fn add(&mut self, source: ActiveSource) {
        self.sources.push(source);
    }

    /// Number of sources currently playing.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Mixes the next block into `output`, which is overwritten. Sources that finish
    /// or are cancelled are released and their completion callbacks run before this
    /// returns.
    pub fn mix(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        let output_channels = self.channels as usize;
        let frames = output.len() / output_channels;

        let mut finished = Vec::new();
        let mut index = 0;
        while index < self.sources.len() {
            let source = &mut self.sources[index];
            let playing = !source.cancel_handle.is_cancelled()
                && source.mix_into(output, output_channels, frames);
            if playing {
                index += 1;
            } else {
                finished.push(self.sources.swap_remove(index));
            }
        }

        output
            .iter_mut()
            .for_each(|sample| *sample = sample.clamp(-1.0, 1.0));

        for source in finished {
            source.finish();
        }
    }

    /// Releases every source, running each completion callback.
    pub fn clear(&mut self) {
        for source in self.sources.drain(..) {
            source.finish();
        }
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::audio::source::MemorySource;

    fn active(
        id: u64,
        samples: Vec<f32>,
        channels: u16,
        finished: &Arc<AtomicUsize>,
    ) -> (ActiveSource, CancelHandle) {
        let cancel_handle = CancelHandle::new();
        let finished = finished.clone();
        (
            ActiveSource::new(
                id,
                Box::new(MemorySource::new(samples, channels, 44100)),
                cancel_handle.clone(),
                Box::new(move || {
                    finished.fetch_add(1, Ordering::SeqCst);
                }),
            ),
            cancel_handle,
        )
    }

    #[test]
    fn test_channel_adaptation() {
        let mut out = [0.0f32; 2];
        adapt_channels(&[0.5], &mut out);
        assert_eq!([0.5, 0.5], out);

        let mut out = [0.0f32; 1];
        adapt_channels(&[0.2, 0.4], &mut out);
        assert!((out[0] - 0.3).abs() < 1e-6);

        let mut out = [0.0f32; 4];
        adapt_channels(&[0.1, 0.2], &mut out);
        assert_eq!([0.1, 0.2, 0.0, 0.0], out);

        let mut out = [0.0f32; 2];
        adapt_channels(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], &mut out);
        assert_eq!([0.1, 0.2], out);
    }

    #[test]
    fn test_layered_sources() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut mixer = Mixer::new(2);
        let (first, _) = active(1, vec![0.25; 3], 1, &finished);
        let (second, _) = active(2, vec![0.5, -0.5, 0.5, -0.5, 0.5, -0.5, 0.5, -0.5], 2, &finished);
        mixer.add(first);
        mixer.add(second);

        let mut block = vec![0.0f32; 4];
        mixer.mix(&mut block);
        assert_eq!(vec![0.75, -0.25, 0.75, -0.25], block);
        assert_eq!(2, mixer.len());

        // The mono source runs out partway through this block.
        mixer.mix(&mut block);
        assert_eq!(vec![0.75, -0.25, 0.5, -0.5], block);
        assert_eq!(1, mixer.len());
        assert_eq!(1, finished.load(Ordering::SeqCst));

        mixer.mix(&mut block);
        assert_eq!(vec![0.0; 4], block);
        assert!(mixer.is_empty());
        assert_eq!(2, finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancelled_source_finishes_once() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut mixer = Mixer::new(1);
        let (source, cancel_handle) = active(1, vec![0.1; 1000], 1, &finished);
        mixer.add(source);

        let mut block = vec![0.0f32; 10];
        mixer.mix(&mut block);
        cancel_handle.cancel();
        mixer.mix(&mut block);
        mixer.mix(&mut block);

        assert_eq!(vec![0.0; 10], block);
        assert!(mixer.is_empty());
        assert_eq!(1, finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_output_is_clamped() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut mixer = Mixer::new(1);
        for id in 0..3 {
            mixer.add(active(id, vec![0.9; 8], 1, &finished).0);
        }

        let mut block = vec![0.0f32; 8];
        mixer.mix(&mut block);
        assert!(block.iter().all(|sample| *sample == 1.0));
    }

    #[test]
    fn test_drop_finishes_sources() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut mixer = Mixer::new(2);
        mixer.add(active(1, vec![0.1; 100], 2, &finished).0);
        mixer.add(active(2, vec![0.1; 100], 2, &finished).0);
        drop(mixer);
        assert_eq!(2, finished.load(Ordering::SeqCst));
    }
}
