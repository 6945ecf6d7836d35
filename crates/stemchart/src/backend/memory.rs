use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{BackendHandle, EndedSender, PlaybackBackend};
use crate::error::BackendError;

/// One call made against a `MemoryBackend`
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Open(PathBuf),
    Play(BackendHandle),
    Stop(BackendHandle),
    Seek(BackendHandle, Duration),
    SetVolume(BackendHandle, f32),
    OnEnded {
        handle: BackendHandle,
        subscribed: bool,
    },
    Close(BackendHandle),
}

impl BackendCall {
    pub fn handle(&self) -> Option<BackendHandle> {
        match self {
            BackendCall::Open(_) => None,
            BackendCall::Play(h)
            | BackendCall::Stop(h)
            | BackendCall::Seek(h, _)
            | BackendCall::SetVolume(h, _)
            | BackendCall::Close(h) => Some(*h),
            BackendCall::OnEnded { handle, .. } => Some(*handle),
        }
    }
}

#[derive(Debug)]
struct Stream {
    path: PathBuf,
    playing: bool,
    sink: Option<EndedSender>,
}

#[derive(Debug, Default)]
struct State {
    streams: HashMap<BackendHandle, Stream>,
    /// Latest handle opened per path
    latest: HashMap<PathBuf, BackendHandle>,
    missing: HashSet<PathBuf>,
    calls: Vec<BackendCall>,
}

/// Backend that produces no output and records every call
///
/// Streams have no length; end-of-media happens only when `finish` is
/// called.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `paths` as absent: opening them fails with `NotFound`
    pub fn with_missing<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let backend = Self::new();
        backend.lock().missing = paths.into_iter().map(Into::into).collect();
        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Handle of the live stream most recently opened for `path`
    pub fn handle_for(&self, path: impl AsRef<Path>) -> Option<BackendHandle> {
        let state = self.lock();
        state
            .latest
            .get(path.as_ref())
            .copied()
            .filter(|h| state.streams.contains_key(h))
    }

    pub fn is_playing(&self, handle: BackendHandle) -> bool {
        self.lock()
            .streams
            .get(&handle)
            .is_some_and(|s| s.playing)
    }

    /// Paths of every stream currently playing
    pub fn playing_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .lock()
            .streams
            .values()
            .filter(|s| s.playing)
            .map(|s| s.path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn open_count(&self) -> usize {
        self.lock().streams.len()
    }

    /// Simulate the media of `handle` running out.
    ///
    /// Returns whether an ended event was delivered.
    pub fn finish(&self, handle: BackendHandle) -> bool {
        let sink = {
            let mut state = self.lock();
            match state.streams.get_mut(&handle) {
                Some(stream) => {
                    stream.playing = false;
                    stream.sink.clone()
                }
                None => None,
            }
        };
        match sink {
            Some(sink) => sink.send(handle).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl PlaybackBackend for MemoryBackend {
    async fn open(&self, path: &Path) -> Result<BackendHandle, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Open(path.to_path_buf()));

        if state.missing.contains(path) {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }

        let handle = BackendHandle::new();
        state.streams.insert(
            handle,
            Stream {
                path: path.to_path_buf(),
                playing: false,
                sink: None,
            },
        );
        state.latest.insert(path.to_path_buf(), handle);
        debug!(%handle, path = %path.display(), "opened in-memory stream");
        Ok(handle)
    }

    async fn play(&self, handle: BackendHandle) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Play(handle));
        if let Some(stream) = state.streams.get_mut(&handle) {
            stream.playing = true;
        }
    }

    fn stop(&self, handle: BackendHandle) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Stop(handle));
        if let Some(stream) = state.streams.get_mut(&handle) {
            stream.playing = false;
        }
    }

    fn seek(&self, handle: BackendHandle, position: Duration) {
        self.lock().calls.push(BackendCall::Seek(handle, position));
    }

    fn set_volume(&self, handle: BackendHandle, level: f32) {
        self.lock().calls.push(BackendCall::SetVolume(handle, level));
    }

    fn on_ended(&self, handle: BackendHandle, sink: Option<EndedSender>) {
        let mut state = self.lock();
        state.calls.push(BackendCall::OnEnded {
            handle,
            subscribed: sink.is_some(),
        });
        if let Some(stream) = state.streams.get_mut(&handle) {
            stream.sink = sink;
        }
    }

    fn close(&self, handle: BackendHandle) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Close(handle));
        state.streams.remove(&handle);
    }
}
