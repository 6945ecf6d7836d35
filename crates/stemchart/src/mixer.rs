//! Channel mixer
//!
//! Owns one backend stream per channel and applies the transport rules on
//! top of the raw backend primitives:
//!
//! - **load**: open, then retire the old stream (unsubscribe, close)
//! - **play**: restart from zero at the session volume, or stop the channel
//!   when the session says it is disabled
//! - **stop / stop_all**: halt output, cursor untouched
//! - **loop-on-end**: an armed channel whose media runs out restarts alone
//!
//! Enabled intent is never stored here. Callers pass the session's view in,
//! so the mixer cannot drift from it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::assets::AssetLocator;
use crate::backend::{BackendHandle, EndedReceiver, EndedSender, PlaybackBackend};
use crate::channel::{ChannelKind, PerChannel};
use crate::error::BackendError;

/// Whether a channel has a usable stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Availability {
    /// Not loaded yet
    #[default]
    Pending,
    Ready,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_ready(&self) -> bool {
        matches!(self, Availability::Ready)
    }
}

/// Notification that every channel was stopped
///
/// The orchestrator has to apply this to its own state; dropping it would
/// leave the transport showing "playing" with silent channels.
#[must_use = "the orchestrator must converge to idle on stop-all"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStopped {
    /// Channels that had a stream to stop
    pub stopped: Vec<ChannelKind>,
}

/// What happened in response to an end-of-media event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndedAction {
    /// Handle no longer belongs to any channel
    Stale,
    /// Channel finished and stays silent
    Finished(ChannelKind),
    /// Channel was restarted from zero
    Looped(ChannelKind),
}

pub struct ChannelMixer {
    backend: Arc<dyn PlaybackBackend>,
    handles: PerChannel<Option<BackendHandle>>,
    availability: PerChannel<Availability>,
    /// Channels that should loop when their media ends
    armed: PerChannel<bool>,
    looping: bool,
    volume: f32,
    ended_tx: EndedSender,
}

impl ChannelMixer {
    /// Create a mixer and the receiver its end-of-media events arrive on
    pub fn new(backend: Arc<dyn PlaybackBackend>, volume: f32, looping: bool) -> (Self, EndedReceiver) {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let mixer = Self {
            backend,
            handles: PerChannel::default(),
            availability: PerChannel::default(),
            armed: PerChannel::default(),
            looping,
            volume,
            ended_tx,
        };
        (mixer, ended_rx)
    }

    pub fn availability(&self, kind: ChannelKind) -> &Availability {
        &self.availability[kind]
    }

    pub fn is_available(&self, kind: ChannelKind) -> bool {
        self.availability[kind].is_ready()
    }

    pub fn handle(&self, kind: ChannelKind) -> Option<BackendHandle> {
        self.handles[kind]
    }

    /// Whether `kind` was started and has not been stopped since
    pub fn is_armed(&self, kind: ChannelKind) -> bool {
        self.armed[kind]
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        if self.looping != looping {
            info!(looping, "loop-on-end changed");
        }
        self.looping = looping;
    }

    /// Open `path` for `kind`, replacing any previous stream.
    ///
    /// Failure leaves the channel unavailable; it never propagates.
    pub async fn load(&mut self, kind: ChannelKind, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let result = self.backend.open(path).await;
        self.install(kind, path, result);
    }

    /// Open every channel's asset concurrently
    pub async fn load_all(&mut self, assets: &AssetLocator) {
        let backend = Arc::clone(&self.backend);
        let opens = ChannelKind::ALL.into_iter().map(|kind| {
            let backend = &backend;
            let path = assets.path_for(kind);
            async move {
                let result = backend.open(&path).await;
                (kind, path, result)
            }
        });

        for (kind, path, result) in join_all(opens).await {
            self.install(kind, &path, result);
        }
    }

    fn install(
        &mut self,
        kind: ChannelKind,
        path: &Path,
        result: Result<BackendHandle, BackendError>,
    ) {
        if let Some(old) = self.handles[kind].take() {
            self.backend.on_ended(old, None);
            self.backend.close(old);
            self.armed[kind] = false;
        }

        match result {
            Ok(handle) => {
                self.backend.on_ended(handle, Some(self.ended_tx.clone()));
                self.handles[kind] = Some(handle);
                self.availability[kind] = Availability::Ready;
                debug!(channel = %kind, path = %path.display(), %handle, "channel loaded");
            }
            Err(e) => {
                warn!(channel = %kind, error = %e, "channel unavailable");
                self.availability[kind] = Availability::Unavailable {
                    reason: e.to_string(),
                };
            }
        }
    }

    /// Reset a channel for a fresh start. Returns the handle to start, or
    /// `None` when the channel must stay silent.
    fn prepare(&mut self, kind: ChannelKind, enabled: &PerChannel<bool>) -> Option<BackendHandle> {
        let Some(handle) = self.handles[kind] else {
            debug!(channel = %kind, "play ignored, no stream");
            return None;
        };
        if !enabled[kind] {
            self.stop(kind);
            return None;
        }

        self.backend.stop(handle);
        self.backend.seek(handle, Duration::ZERO);
        self.armed[kind] = true;
        self.backend.set_volume(handle, self.volume);
        Some(handle)
    }

    /// Start `kind` from zero. Safe to call while it is already playing.
    pub async fn play(&mut self, kind: ChannelKind, enabled: &PerChannel<bool>) {
        if let Some(handle) = self.prepare(kind, enabled) {
            self.backend.play(handle).await;
        }
    }

    /// Start several channels at once and wait for all of them
    pub async fn play_many(&mut self, kinds: &[ChannelKind], enabled: &PerChannel<bool>) {
        let mut starts = JoinSet::new();
        for &kind in kinds {
            if let Some(handle) = self.prepare(kind, enabled) {
                let backend = Arc::clone(&self.backend);
                starts.spawn(async move {
                    backend.play(handle).await;
                    kind
                });
            }
        }

        while let Some(joined) = starts.join_next().await {
            match joined {
                Ok(kind) => debug!(channel = %kind, "channel started"),
                Err(e) => warn!(error = %e, "channel start task failed"),
            }
        }
    }

    /// Halt `kind`. The stream keeps its cursor.
    pub fn stop(&mut self, kind: ChannelKind) {
        self.armed[kind] = false;
        if let Some(handle) = self.handles[kind] {
            self.backend.stop(handle);
        }
    }

    /// Halt every channel
    pub fn stop_all(&mut self) -> PlaybackStopped {
        let mut stopped = Vec::new();
        for kind in ChannelKind::ALL {
            if self.handles[kind].is_some() {
                self.stop(kind);
                stopped.push(kind);
            } else {
                self.armed[kind] = false;
            }
        }
        PlaybackStopped { stopped }
    }

    /// Apply the loop policy to an end-of-media event
    pub async fn handle_ended(&mut self, handle: BackendHandle) -> EndedAction {
        let Some(kind) = self
            .handles
            .iter()
            .find_map(|(kind, h)| (*h == Some(handle)).then_some(kind))
        else {
            debug!(%handle, "ignoring end of media from retired stream");
            return EndedAction::Stale;
        };

        if !(self.looping && self.armed[kind]) {
            self.armed[kind] = false;
            return EndedAction::Finished(kind);
        }

        self.backend.seek(handle, Duration::ZERO);
        self.backend.play(handle).await;
        debug!(channel = %kind, "looped");
        EndedAction::Looped(kind)
    }

    /// Release every stream
    pub fn close_all(&mut self) {
        for kind in ChannelKind::ALL {
            if let Some(handle) = self.handles[kind].take() {
                self.backend.on_ended(handle, None);
                self.backend.close(handle);
            }
            self.armed[kind] = false;
            self.availability[kind] = Availability::Pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MemoryBackend};
    use std::path::PathBuf;

    fn assets() -> AssetLocator {
        AssetLocator::new("audio", "wav")
    }

    async fn loaded(backend: &Arc<MemoryBackend>) -> (ChannelMixer, EndedReceiver) {
        let (mut mixer, rx) = ChannelMixer::new(backend.clone(), 0.7, true);
        mixer.load_all(&assets()).await;
        backend.clear_calls();
        (mixer, rx)
    }

    fn handle(backend: &MemoryBackend, kind: ChannelKind) -> BackendHandle {
        backend.handle_for(assets().path_for(kind)).unwrap()
    }

    #[tokio::test]
    async fn test_load_all_survives_missing_asset() {
        let backend = Arc::new(MemoryBackend::with_missing(["audio/bass.wav"]));
        let (mut mixer, _rx) = ChannelMixer::new(backend.clone(), 0.7, true);
        mixer.load_all(&assets()).await;

        assert!(mixer.is_available(ChannelKind::Drums));
        assert!(mixer.is_available(ChannelKind::Vocals));
        assert!(matches!(
            mixer.availability(ChannelKind::Bass),
            Availability::Unavailable { .. }
        ));
        assert_eq!(backend.open_count(), 3);
    }

    #[tokio::test]
    async fn test_play_restarts_from_zero_at_volume() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;
        let h = handle(&backend, ChannelKind::Drums);

        mixer.play(ChannelKind::Drums, &PerChannel::splat(true)).await;

        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::Stop(h),
                BackendCall::Seek(h, Duration::ZERO),
                BackendCall::SetVolume(h, 0.7),
                BackendCall::Play(h),
            ]
        );
        assert!(mixer.is_armed(ChannelKind::Drums));
    }

    #[tokio::test]
    async fn test_play_disabled_channel_stops_it() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;
        let h = handle(&backend, ChannelKind::Bass);

        let mut enabled = PerChannel::splat(true);
        enabled[ChannelKind::Bass] = false;
        mixer.play(ChannelKind::Bass, &enabled).await;

        assert_eq!(backend.calls(), vec![BackendCall::Stop(h)]);
        assert!(!mixer.is_armed(ChannelKind::Bass));
    }

    #[tokio::test]
    async fn test_play_without_stream_is_noop() {
        let backend = Arc::new(MemoryBackend::with_missing(["audio/others.wav"]));
        let (mut mixer, _rx) = loaded(&backend).await;

        mixer.play(ChannelKind::Others, &PerChannel::splat(true)).await;
        mixer.stop(ChannelKind::Others);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_play_many_starts_every_enabled_channel() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;

        let mut enabled = PerChannel::splat(false);
        enabled[ChannelKind::Drums] = true;
        enabled[ChannelKind::Vocals] = true;
        mixer
            .play_many(&[ChannelKind::Drums, ChannelKind::Vocals], &enabled)
            .await;

        assert_eq!(
            backend.playing_paths(),
            vec![PathBuf::from("audio/drums.wav"), PathBuf::from("audio/vocals.wav")]
        );
    }

    #[tokio::test]
    async fn test_stop_all_reports_stopped_channels() {
        let backend = Arc::new(MemoryBackend::with_missing(["audio/vocals.wav"]));
        let (mut mixer, _rx) = loaded(&backend).await;
        mixer
            .play_many(&ChannelKind::ALL, &PerChannel::splat(true))
            .await;

        let stopped = mixer.stop_all();
        assert_eq!(
            stopped.stopped,
            vec![ChannelKind::Drums, ChannelKind::Bass, ChannelKind::Others]
        );
        assert!(backend.playing_paths().is_empty());

        // Already stopped is fine
        let again = mixer.stop_all();
        assert_eq!(again, stopped);
    }

    #[tokio::test]
    async fn test_reload_retires_old_stream() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;
        let old = handle(&backend, ChannelKind::Drums);

        mixer.load(ChannelKind::Drums, "alt/drums.wav").await;
        let new = mixer.handle(ChannelKind::Drums).unwrap();
        assert_ne!(old, new);

        let calls = backend.calls();
        assert!(calls.contains(&BackendCall::OnEnded { handle: old, subscribed: false }));
        assert!(calls.contains(&BackendCall::Close(old)));
        assert_eq!(mixer.handle_ended(old).await, EndedAction::Stale);
    }

    #[tokio::test]
    async fn test_failed_reload_leaves_channel_unavailable() {
        let backend = Arc::new(MemoryBackend::with_missing(["alt/bass.wav"]));
        let (mut mixer, _rx) = loaded(&backend).await;

        mixer.load(ChannelKind::Bass, "alt/bass.wav").await;
        assert_eq!(mixer.handle(ChannelKind::Bass), None);
        assert!(!mixer.is_available(ChannelKind::Bass));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_stem_is_unavailable_and_never_loops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drums.wav");
        std::fs::write(&path, crate::decode::sine_wav(440.0, 0.0, 8000).unwrap()).unwrap();

        let backend = Arc::new(crate::backend::FileBackend::new());
        let (mut mixer, mut rx) = ChannelMixer::new(backend, 0.7, true);
        mixer.load(ChannelKind::Drums, &path).await;

        assert_eq!(mixer.handle(ChannelKind::Drums), None);
        assert!(matches!(
            mixer.availability(ChannelKind::Drums),
            Availability::Unavailable { .. }
        ));

        mixer.play(ChannelKind::Drums, &PerChannel::splat(true)).await;
        assert!(!mixer.is_armed(ChannelKind::Drums));

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ended_loops_armed_channel() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, mut rx) = loaded(&backend).await;
        mixer.play(ChannelKind::Vocals, &PerChannel::splat(true)).await;
        let h = handle(&backend, ChannelKind::Vocals);

        assert!(backend.finish(h));
        let ended = rx.recv().await.unwrap();
        assert_eq!(mixer.handle_ended(ended).await, EndedAction::Looped(ChannelKind::Vocals));
        assert!(backend.is_playing(h));
        assert!(!backend.is_playing(handle(&backend, ChannelKind::Drums)));
    }

    #[tokio::test]
    async fn test_ended_without_looping_finishes() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;
        mixer.set_looping(false);
        mixer.play(ChannelKind::Bass, &PerChannel::splat(true)).await;
        let h = handle(&backend, ChannelKind::Bass);

        backend.finish(h);
        assert_eq!(mixer.handle_ended(h).await, EndedAction::Finished(ChannelKind::Bass));
        assert!(!backend.is_playing(h));
        assert!(!mixer.is_armed(ChannelKind::Bass));
    }

    #[tokio::test]
    async fn test_ended_after_stop_does_not_restart() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;
        mixer.play(ChannelKind::Others, &PerChannel::splat(true)).await;
        mixer.stop(ChannelKind::Others);
        let h = handle(&backend, ChannelKind::Others);

        assert_eq!(mixer.handle_ended(h).await, EndedAction::Finished(ChannelKind::Others));
        assert!(!backend.is_playing(h));
    }

    #[tokio::test]
    async fn test_close_all_releases_streams() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut mixer, _rx) = loaded(&backend).await;
        mixer.close_all();

        assert_eq!(backend.open_count(), 0);
        assert_eq!(mixer.availability(ChannelKind::Drums), &Availability::Pending);
    }
}
