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
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::PlaybackError;
use crate::audio::Device;
use crate::playsync::CancelHandle;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one playback of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> SessionId {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of a playing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub path: PathBuf,
    pub elapsed: Duration,
}

struct Session {
    path: PathBuf,
    started: Instant,
    cancel_handle: CancelHandle,
}

struct Inner {
    device: Arc<dyn Device>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    released: AtomicU64,
}

impl Inner {
    /// Removes a session. Called from the device's thread once the decoder is gone.
    /// Unknown ids are ignored.
    fn finish(&self, id: SessionId) {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.remove(&id) else {
            return;
        };
        self.released.fetch_add(1, Ordering::Relaxed);
        drop(sessions);

        debug!(
            session = %id,
            path = ?session.path,
            played = ?session.started.elapsed(),
            "Playback finished"
        );
    }
}

/// The set of sounds currently playing. Any number of sessions can overlap, including
/// several of the same file. Cloning shares the same set.
#[derive(Clone)]
pub struct PlaybackPool {
    inner: Arc<Inner>,
}

impl PlaybackPool {
    pub fn new(device: Arc<dyn Device>) -> PlaybackPool {
        PlaybackPool {
            inner: Arc::new(Inner {
                device,
                sessions: Mutex::new(HashMap::new()),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Starts playing the file on top of whatever is already playing. Returns as soon as
    /// output has started; the session removes itself when it ends.
    pub fn play(&self, path: &Path) -> Result<SessionId, PlaybackError> {
        let span = span!(Level::INFO, "play", path = ?path);
        let _enter = span.enter();

        let source = self.inner.device.open(path)?;

        let id = SessionId::next();
        let cancel_handle = CancelHandle::new();
        // Registered before output starts, so a clip that ends immediately still
        // finds its session.
        self.inner.sessions.lock().insert(
            id,
            Session {
                path: path.to_path_buf(),
                started: Instant::now(),
                cancel_handle: cancel_handle.clone(),
            },
        );

        let inner = Arc::downgrade(&self.inner);
        let on_finished = Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.finish(id);
            }
        });

        if let Err(e) = self.inner.device.start(source, cancel_handle, on_finished) {
            self.inner.sessions.lock().remove(&id);
            warn!(err = %e, "Unable to start playback");
            return Err(e.into());
        }

        info!(session = %id, device = %self.inner.device, "Playing");
        Ok(id)
    }

    /// Asks one session to stop. Returns false if it isn't playing.
    pub fn stop(&self, id: SessionId) -> bool {
        let cancel_handle = self
            .inner
            .sessions
            .lock()
            .get(&id)
            .map(|session| session.cancel_handle.clone());
        match cancel_handle {
            Some(cancel_handle) => {
                cancel_handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Asks every playing session to stop. Sessions leave the pool as the device
    /// releases them, so the pool may still report them briefly after this returns.
    pub fn stop_all(&self) {
        let cancel_handles: Vec<CancelHandle> = self
            .inner
            .sessions
            .lock()
            .values()
            .map(|session| session.cancel_handle.clone())
            .collect();
        if cancel_handles.is_empty() {
            return;
        }

        info!(sessions = cancel_handles.len(), "Stopping all playback");
        for cancel_handle in cancel_handles {
            cancel_handle.cancel();
        }
    }

    /// Number of sessions currently playing.
    pub fn active_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// The playing sessions, oldest first.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .sessions
            .lock()
            .iter()
            .map(|(id, session)| SessionInfo {
                id: *id,
                path: session.path.clone(),
                elapsed: session.started.elapsed(),
            })
            .collect();
        sessions.sort_by_key(|session| session.id);
        sessions
    }

    /// Number of sessions released since the pool was created.
    pub fn released_count(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::time::Duration;

    use super::*;
    use crate::audio::{mock, SourceError};
    use crate::testutil::eventually;

    fn pool(clip_length: Duration) -> (PlaybackPool, mock::Device) {
        let device = mock::Device::get("mock-device").with_clip_length(clip_length);
        (PlaybackPool::new(Arc::new(device.clone())), device)
    }

    fn clip(dir: &tempfile::TempDir, name: &str) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.path().join(name);
        std::fs::write(&path, b"")?;
        Ok(path)
    }

    #[test]
    fn test_sessions_layer() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let b = clip(&dir, "b.wav")?;
        let (pool, device) = pool(Duration::from_secs(60));

        let first = pool.play(&a)?;
        let second = pool.play(&b)?;
        let third = pool.play(&a)?;
        assert_ne!(first, third);
        assert_eq!(3, pool.active_count());
        assert_eq!(3, device.playing());

        let paths: Vec<PathBuf> = pool.sessions().into_iter().map(|s| s.path).collect();
        assert_eq!(vec![a.clone(), b, a], paths);

        pool.stop_all();
        eventually(|| pool.active_count() == 0, "Sessions never stopped");
        Ok(())
    }

    #[test]
    fn test_natural_completion_removes_session() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, device) = pool(Duration::from_millis(20));

        pool.play(&a)?;
        eventually(|| pool.active_count() == 0, "Session never completed");
        assert_eq!(1, pool.released_count());
        assert_eq!(1, device.released());
        Ok(())
    }

    #[test]
    fn test_stop_all_releases_each_once() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, device) = pool(Duration::from_secs(60));

        for _ in 0..5 {
            pool.play(&a)?;
        }
        pool.stop_all();
        // A second stop while the first is still draining is harmless.
        pool.stop_all();

        eventually(|| pool.active_count() == 0, "Sessions never stopped");
        eventually(|| device.released() == 5, "Sources never released");
        assert_eq!(5, pool.released_count());
        assert_eq!(5, device.finished_callbacks());
        Ok(())
    }

    #[test]
    fn test_stop_all_empty() {
        let (pool, device) = pool(Duration::from_secs(60));
        pool.stop_all();
        assert_eq!(0, pool.active_count());
        assert_eq!(0, pool.released_count());
        assert_eq!(0, device.finished_callbacks());
    }

    #[test]
    fn test_stop_one() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, _device) = pool(Duration::from_secs(60));

        let first = pool.play(&a)?;
        let second = pool.play(&a)?;
        assert!(pool.stop(first));
        eventually(|| pool.active_count() == 1, "Session never stopped");
        assert_eq!(second, pool.sessions()[0].id);

        eventually(|| !pool.stop(first), "Stopped session still present");
        pool.stop_all();
        Ok(())
    }

    #[test]
    fn test_missing_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, device) = pool(Duration::from_secs(60));
        pool.play(&a)?;

        let result = pool.play(&dir.path().join("missing.wav"));
        assert!(matches!(
            result,
            Err(PlaybackError::Open(SourceError::Open { .. }))
        ));
        assert_eq!(1, pool.active_count());
        assert_eq!(1, device.opened());

        pool.stop_all();
        Ok(())
    }

    #[test]
    fn test_start_failure_removes_session() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, device) = pool(Duration::from_secs(60));

        device.set_fail_start(true);
        assert!(matches!(pool.play(&a), Err(PlaybackError::Start(_))));
        assert_eq!(0, pool.active_count());
        assert_eq!(1, device.released());
        assert_eq!(0, pool.released_count());
        Ok(())
    }

    #[test]
    fn test_finish_twice_releases_once() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, device) = pool(Duration::from_millis(100));

        let id = pool.play(&a)?;
        pool.inner.finish(id);
        pool.inner.finish(id);
        assert_eq!(0, pool.active_count());
        assert_eq!(1, pool.released_count());

        // The device's own completion lands on an id the pool no longer has.
        eventually(|| device.finished_callbacks() == 1, "Clip never finished");
        assert_eq!(1, pool.released_count());
        Ok(())
    }

    #[test]
    fn test_stop_all_races_completion() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let a = clip(&dir, "a.wav")?;
        let (pool, device) = pool(Duration::from_micros(50));

        let mut started = 0;
        for _ in 0..50 {
            for _ in 0..4 {
                pool.play(&a)?;
                started += 1;
            }
            pool.stop_all();
        }

        eventually(|| pool.active_count() == 0, "Sessions never drained");
        eventually(
            || device.finished_callbacks() == started,
            "Not every source finished",
        );
        assert_eq!(started as u64, pool.released_count());
        assert_eq!(started, device.released());
        Ok(())
    }
}
