//! Headless file backend
//!
//! Reads the resource's headers on open to learn its length, then keeps transport
//! timing per stream. No device output is produced; the point is that
//! end-of-media arrives at the right moment so looping and status behave as
//! they would against a real sink.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{BackendHandle, EndedSender, PlaybackBackend};
use crate::decode::probe_audio;
use crate::error::BackendError;

#[derive(Debug)]
struct Stream {
    path: PathBuf,
    duration: Duration,
    /// Cursor as of the last start/stop/seek
    cursor: Duration,
    /// Set while output is running
    started: Option<Instant>,
    volume: f32,
    sink: Option<EndedSender>,
    /// Bumped on every transport change so stale end timers can tell
    generation: u64,
}

impl Stream {
    fn position(&self) -> Duration {
        match self.started {
            Some(at) => (self.cursor + at.elapsed()).min(self.duration),
            None => self.cursor,
        }
    }

    fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.cursor)
    }
}

type Streams = Arc<Mutex<HashMap<BackendHandle, Stream>>>;

fn lock(streams: &Streams) -> MutexGuard<'_, HashMap<BackendHandle, Stream>> {
    streams.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default, Clone)]
pub struct FileBackend {
    streams: Streams,
}

impl FileBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the media behind `handle`
    pub fn duration(&self, handle: BackendHandle) -> Option<Duration> {
        lock(&self.streams).get(&handle).map(|s| s.duration)
    }

    /// Current playback cursor of `handle`
    pub fn position(&self, handle: BackendHandle) -> Option<Duration> {
        lock(&self.streams).get(&handle).map(Stream::position)
    }

    pub fn is_playing(&self, handle: BackendHandle) -> bool {
        lock(&self.streams)
            .get(&handle)
            .is_some_and(|s| s.started.is_some())
    }

    pub fn volume(&self, handle: BackendHandle) -> Option<f32> {
        lock(&self.streams).get(&handle).map(|s| s.volume)
    }

    /// Arm an end-of-media timer for the current run of `handle`
    fn schedule_end(&self, handle: BackendHandle, generation: u64, after: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(%handle, "no runtime, end-of-media will not be reported");
            return;
        };
        let streams = Arc::clone(&self.streams);
        runtime.spawn(async move {
            tokio::time::sleep(after).await;

            let sink = {
                let mut streams = lock(&streams);
                let Some(stream) = streams.get_mut(&handle) else {
                    return;
                };
                if stream.generation != generation || stream.started.is_none() {
                    return;
                }
                stream.started = None;
                stream.cursor = stream.duration;
                stream.sink.clone()
            };

            trace!(%handle, "media ended");
            if let Some(sink) = sink {
                let _ = sink.send(handle);
            }
        });
    }
}

#[async_trait]
impl PlaybackBackend for FileBackend {
    async fn open(&self, path: &Path) -> Result<BackendHandle, BackendError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| BackendError::from_io(path, e))?;

        let info = tokio::task::spawn_blocking(move || probe_audio(&data))
            .await
            .map_err(|e| BackendError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .map_err(|e| BackendError::Decode {
                path: path.to_path_buf(),
                message: format!("{e:#}"),
            })?;

        // An empty stream would report its end the instant it starts
        let duration = info.duration();
        if duration.is_zero() {
            return Err(BackendError::Decode {
                path: path.to_path_buf(),
                message: "media contains no audio".to_string(),
            });
        }

        let handle = BackendHandle::new();
        debug!(
            %handle,
            path = %path.display(),
            sample_rate = info.sample_rate,
            channels = info.channels,
            ?duration,
            "opened audio file"
        );

        lock(&self.streams).insert(
            handle,
            Stream {
                path: path.to_path_buf(),
                duration,
                cursor: Duration::ZERO,
                started: None,
                volume: 1.0,
                sink: None,
                generation: 0,
            },
        );
        Ok(handle)
    }

    async fn play(&self, handle: BackendHandle) {
        let scheduled = {
            let mut streams = lock(&self.streams);
            let Some(stream) = streams.get_mut(&handle) else {
                return;
            };
            if stream.started.is_some() {
                return;
            }
            stream.generation += 1;
            stream.started = Some(Instant::now());
            trace!(%handle, path = %stream.path.display(), "play");
            (stream.generation, stream.remaining())
        };
        self.schedule_end(handle, scheduled.0, scheduled.1);
    }

    fn stop(&self, handle: BackendHandle) {
        let mut streams = lock(&self.streams);
        if let Some(stream) = streams.get_mut(&handle) {
            stream.cursor = stream.position();
            stream.started = None;
            stream.generation += 1;
        }
    }

    fn seek(&self, handle: BackendHandle, position: Duration) {
        let rescheduled = {
            let mut streams = lock(&self.streams);
            let Some(stream) = streams.get_mut(&handle) else {
                return;
            };
            stream.cursor = position.min(stream.duration);
            stream.generation += 1;
            if stream.started.is_some() {
                stream.started = Some(Instant::now());
                Some((stream.generation, stream.remaining()))
            } else {
                None
            }
        };
        if let Some((generation, after)) = rescheduled {
            self.schedule_end(handle, generation, after);
        }
    }

    fn set_volume(&self, handle: BackendHandle, level: f32) {
        if let Some(stream) = lock(&self.streams).get_mut(&handle) {
            stream.volume = level.clamp(0.0, 1.0);
        }
    }

    fn on_ended(&self, handle: BackendHandle, sink: Option<EndedSender>) {
        if let Some(stream) = lock(&self.streams).get_mut(&handle) {
            stream.sink = sink;
        }
    }

    fn close(&self, handle: BackendHandle) {
        if let Some(stream) = lock(&self.streams).remove(&handle) {
            debug!(%handle, path = %stream.path.display(), "closed audio file");
        }
    }
}
