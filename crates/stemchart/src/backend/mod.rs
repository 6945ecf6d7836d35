//! Playback backends
//!
//! A backend owns open audio streams and exposes transport primitives on
//! them. The mixer only ever talks to the trait; which backend sits behind it
//! is chosen at startup.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::{BackendCall, MemoryBackend};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::BackendError;

/// Opaque reference to one open audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(Uuid);

impl BackendHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BackendHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a backend reports that a stream's media ran out
pub type EndedSender = mpsc::UnboundedSender<BackendHandle>;
pub type EndedReceiver = mpsc::UnboundedReceiver<BackendHandle>;

/// Audio output collaborator
///
/// Opening and starting may take time and are async. Everything else is
/// synchronous and infallible: calls on an unknown or closed handle are
/// ignored.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Open the resource at `path`
    async fn open(&self, path: &Path) -> Result<BackendHandle, BackendError>;

    /// Start (or resume) output from the current cursor
    async fn play(&self, handle: BackendHandle);

    /// Halt output, keeping the cursor where it is
    fn stop(&self, handle: BackendHandle);

    /// Move the cursor
    fn seek(&self, handle: BackendHandle, position: Duration);

    /// Output level in `0.0..=1.0`
    fn set_volume(&self, handle: BackendHandle, level: f32);

    /// Route end-of-media for `handle` to `sink`; `None` unsubscribes
    fn on_ended(&self, handle: BackendHandle, sink: Option<EndedSender>);

    /// Release the stream. The handle is dead afterwards.
    fn close(&self, handle: BackendHandle);
}
