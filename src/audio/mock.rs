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
use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{debug, info};

use super::{DeviceError, FinishedCallback, Source, SourceError};
use crate::playsync::CancelHandle;

/// Default length of every mock clip.
const DEFAULT_CLIP_LENGTH: Duration = Duration::from_millis(500);

const MOCK_SAMPLE_RATE: u32 = 44100;

#[derive(Default)]
struct Stats {
    opened: AtomicUsize,
    released: AtomicUsize,
    playing: AtomicUsize,
    finished_callbacks: AtomicUsize,
}

/// A mock device. Doesn't actually play anything: every file it opens is a silent clip
/// of a fixed length, and playback is a thread that waits for the clip to run out or be
/// cancelled. Clones share counters so tests can watch resources come and go.
#[derive(Clone)]
pub struct Device {
    name: String,
    clip_length: Duration,
    fail_start: Arc<AtomicBool>,
    stats: Arc<Stats>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            clip_length: DEFAULT_CLIP_LENGTH,
            fail_start: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Stats::default()),
        }
    }

    /// Sets how long each opened clip plays for.
    pub fn with_clip_length(mut self, clip_length: Duration) -> Device {
        self.clip_length = clip_length;
        self
    }

    /// Makes subsequent starts fail as if the output had gone away.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }

    /// Number of sources opened so far.
    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::Relaxed)
    }

    /// Number of sources dropped so far.
    pub fn released(&self) -> usize {
        self.stats.released.load(Ordering::Relaxed)
    }

    /// Number of sources currently playing.
    pub fn playing(&self) -> usize {
        self.stats.playing.load(Ordering::Relaxed)
    }

    /// Number of finished callbacks invoked so far.
    pub fn finished_callbacks(&self) -> usize {
        self.stats.finished_callbacks.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn open(&self, path: &Path) -> Result<Box<dyn Source>, SourceError> {
        if !path.is_file() {
            return Err(SourceError::Open {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            });
        }

        self.stats.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockSource {
            path: path.to_path_buf(),
            remaining: frames_for(self.clip_length),
            duration: self.clip_length,
            stats: self.stats.clone(),
        }))
    }

    fn start(
        &self,
        source: Box<dyn Source>,
        cancel_handle: CancelHandle,
        on_finished: FinishedCallback,
    ) -> Result<(), DeviceError> {
        if self.fail_start.load(Ordering::Relaxed) {
            return Err(DeviceError::Stopped(self.name.clone()));
        }

        let duration = source.duration().unwrap_or(self.clip_length);
        info!(device = self.name, duration = ?duration, "Playing clip (mock).");

        self.stats.playing.fetch_add(1, Ordering::Relaxed);
        let stats = self.stats.clone();
        let spawned = thread::Builder::new()
            .name("mock-playback".to_string())
            .spawn(move || {
                let cancelled = cancel_handle.wait_timeout(duration);
                debug!(cancelled, "Mock clip done");
                drop(source);
                stats.playing.fetch_sub(1, Ordering::Relaxed);
                on_finished();
                stats.finished_callbacks.fetch_add(1, Ordering::Relaxed);
            });

        if let Err(e) = spawned {
            self.stats.playing.fetch_sub(1, Ordering::Relaxed);
            return Err(DeviceError::Backend(e.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

fn frames_for(duration: Duration) -> u64 {
    (duration.as_secs_f64() * MOCK_SAMPLE_RATE as f64) as u64
}

/// A silent stereo clip.
struct MockSource {
    path: PathBuf,
    remaining: u64,
    duration: Duration,
    stats: Arc<Stats>,
}

impl Source for MockSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, SourceError> {
        let frames = ((buf.len() / 2) as u64).min(self.remaining);
        let samples = frames as usize * 2;
        buf[..samples].fill(0.0);
        self.remaining -= frames;
        Ok(samples)
    }

    fn channel_count(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        MOCK_SAMPLE_RATE
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        debug!(path = ?self.path, "Releasing mock clip");
        self.stats.released.fetch_add(1, Ordering::Relaxed);
    }
}
