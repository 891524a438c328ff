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
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::{Source, SourceError};

/// Decodes an audio file (WAV, MP3, FLAC, Ogg and the rest of what symphonia supports)
/// into interleaved f32 samples, one packet at a time.
pub struct FileSource {
    path: PathBuf,
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
    /// Samples of the most recently decoded packet.
    pending: Vec<f32>,
    /// Read position within pending.
    position: usize,
    finished: bool,
}

impl FileSource {
    /// Opens and probes the file. Fails if the file is missing, isn't audio, or lacks the
    /// information needed to play it.
    pub fn open(path: &Path) -> Result<FileSource, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|source| SourceError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SourceError::NoTrack(path.to_path_buf()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| SourceError::NoSampleRate(path.to_path_buf()))?;
        let duration = params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));
        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|source| SourceError::Format {
                path: path.to_path_buf(),
                source,
            })?;

        let mut source = FileSource {
            path: path.to_path_buf(),
            format_reader,
            decoder,
            track_id,
            channels: params.channels.map(|c| c.count() as u16).unwrap_or(0),
            sample_rate,
            duration,
            pending: Vec::new(),
            position: 0,
            finished: false,
        };

        // Some containers leave the channel layout to the codec. Decoding the first
        // packet reveals it, and its samples are kept for the first read.
        if source.channels == 0 {
            match source.next_packet()? {
                Some(samples) => source.pending = samples,
                None => source.finished = true,
            }
        }
        if source.channels == 0 {
            return Err(SourceError::NoChannels(source.path));
        }

        Ok(source)
    }

    /// Decodes the next packet of our track. Returns None at the end of the stream.
    fn next_packet(&mut self) -> Result<Option<Vec<f32>>, SourceError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                // Some readers report the end of the stream as a decode error.
                Err(SymphoniaError::DecodeError(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = %self.path.display(), err = e, "Skipping undecodable packet");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            if self.channels == 0 {
                self.channels = spec.channels.count() as u16;
            }
            return Ok(Some(buffer.samples().to_vec()));
        }
    }
}

impl Source for FileSource {
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, SourceError> {
        let mut written = 0;
        while written < buffer.len() {
            if self.position >= self.pending.len() {
                if self.finished {
                    break;
                }
                match self.next_packet()? {
                    Some(samples) => {
                        self.pending = samples;
                        self.position = 0;
                    }
                    None => self.finished = true,
                }
                continue;
            }

            let count = (buffer.len() - written).min(self.pending.len() - self.position);
            buffer[written..written + count]
                .copy_from_slice(&self.pending[self.position..self.position + count]);
            written += count;
            self.position += count;
        }
        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}
