//! Session orchestrator
//!
//! Single owner of the session state. Transport commands, channel toggles,
//! clock ticks and end-of-media events all land here, one at a time, and
//! every state change is followed by a full snapshot on the watch channel.
//!
//! Transitions:
//!
//! ```text
//!            play_all (some channel enabled)
//!   Idle ───────────────────────────────────────▶ Playing
//!    ▲                                              │
//!    │  stop_all | last channel disabled |          │
//!    └──────────── tick reaches max position ◀──────┘
//! ```
//!
//! Reveal is reset only by `play_all`; after a pass completes the chart stays
//! fully revealed with the cursor parked at zero.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use crate::assets::AssetLocator;
use crate::backend::BackendHandle;
use crate::channel::{ChannelKind, PerChannel};
use crate::config::SessionConfig;
use crate::mixer::{ChannelMixer, EndedAction, PlaybackStopped};
use crate::session::{PlaybackSession, SessionSnapshot, TransportState};
use crate::tick_clock::PlaybackClock;
use crate::track::Track;

pub struct Orchestrator {
    session: PlaybackSession,
    mixer: ChannelMixer,
    clock: PlaybackClock,
    updates: watch::Sender<SessionSnapshot>,
    stop_alls: u64,
}

impl Orchestrator {
    /// Build a session with freshly generated chart tracks
    pub fn new(config: &SessionConfig, mixer: ChannelMixer) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let tracks = PerChannel::from_fn(|kind| {
            Track::generate(
                kind,
                config.points_per_channel,
                config.max_position,
                config.jitter,
                &mut rng,
            )
        });
        Self::with_tracks(config, mixer, tracks)
    }

    pub fn with_tracks(config: &SessionConfig, mixer: ChannelMixer, tracks: PerChannel<Track>) -> Self {
        let session = PlaybackSession::new(tracks, config.max_position);
        let clock = PlaybackClock::new(config.tick_interval, config.tick_increment);
        let initial = session.snapshot(mixer.is_looping(), |kind| mixer.availability(kind).clone());
        let (updates, _) = watch::channel(initial);

        Self {
            session,
            mixer,
            clock,
            updates,
            stop_alls: 0,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn mixer(&self) -> &ChannelMixer {
        &self.mixer
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Number of stop-all transitions applied so far
    pub fn stop_all_count(&self) -> u64 {
        self.stop_alls
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session
            .snapshot(self.mixer.is_looping(), |kind| self.mixer.availability(kind).clone())
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    /// Open every channel's asset
    pub async fn load_channels(&mut self, assets: &AssetLocator) {
        self.mixer.load_all(assets).await;
        let ready = ChannelKind::ALL
            .iter()
            .filter(|kind| self.mixer.is_available(**kind))
            .count();
        info!(ready, total = ChannelKind::COUNT, dir = %assets.dir().display(), "channels loaded");
        self.publish();
    }

    /// Stop the clock and every channel, then converge to idle
    fn halt(&mut self) {
        self.clock.stop();
        let stopped = self.mixer.stop_all();
        self.stop_alls += 1;
        self.apply_stopped(stopped);
    }

    fn apply_stopped(&mut self, stopped: PlaybackStopped) {
        debug!(channels = ?stopped.stopped, "playback stopped");
        self.session.set_state(TransportState::Idle);
    }

    /// Restart the session from zero with every enabled channel
    pub async fn play_all(&mut self) {
        if !self.session.any_enabled() {
            debug!("play ignored, no channel enabled");
            return;
        }

        self.session.set_position(0.0);
        self.session.reset_reveal();
        self.session.reveal_all(0.0);
        self.session.set_state(TransportState::Playing);
        self.publish();

        // Clean start: the stop notification drops us to idle, playback
        // starting puts us back
        self.halt();
        self.session.set_state(TransportState::Playing);

        let channels = self.session.enabled_channels();
        self.mixer.play_many(&channels, self.session.enabled()).await;

        self.clock.start();
        info!(channels = ?channels, "playback started");
        self.publish();
    }

    pub fn stop_all(&mut self) {
        let was_active = self.session.is_active();
        self.session.set_state(TransportState::Idle);
        self.halt();
        if was_active {
            info!(position = self.session.position(), "playback stopped");
        } else {
            debug!("stop while idle");
        }
        self.publish();
    }

    /// Change a channel's enabled intent
    pub async fn toggle_channel(&mut self, kind: ChannelKind, enabled: bool) {
        if !self.session.set_enabled(kind, enabled) {
            debug!(channel = %kind, enabled, "toggle ignored, unchanged");
            return;
        }
        info!(channel = %kind, enabled, "channel toggled");

        if self.session.is_active() {
            if enabled {
                self.mixer.play(kind, self.session.enabled()).await;
            } else {
                self.mixer.stop(kind);
                if !self.session.any_enabled() {
                    info!("last channel disabled");
                    self.halt();
                }
            }
        }

        if self.session.is_active() {
            let position = self.session.position();
            self.session.reveal_channel(kind, position);
        }
        self.publish();
    }

    /// Toggle by textual name. Returns false for an unknown name.
    pub async fn toggle_channel_by_name(&mut self, name: &str, enabled: bool) -> bool {
        match ChannelKind::from_name(name) {
            Some(kind) => {
                self.toggle_channel(kind, enabled).await;
                true
            }
            None => {
                debug!(name, "toggle ignored, unknown channel");
                false
            }
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.mixer.set_looping(looping);
        self.publish();
    }

    /// Wait for the clock. Never resolves while idle.
    pub async fn next_tick(&mut self) -> f64 {
        self.clock.tick().await
    }

    /// Advance the cursor by one clock increment
    pub fn on_tick(&mut self, increment: f64) {
        if !self.session.is_active() {
            trace!("tick ignored, idle");
            return;
        }

        let next = self.session.position() + increment;
        self.session.reveal_all(next);

        if next >= self.session.max_position() {
            self.session.set_position(0.0);
            self.session.set_state(TransportState::Idle);
            self.halt();
            info!("reached end of range");
        } else {
            self.session.set_position(next);
            trace!(position = next, "tick");
        }
        self.publish();
    }

    /// Route an end-of-media event through the loop policy
    pub async fn on_media_ended(&mut self, handle: BackendHandle) -> EndedAction {
        let action = self.mixer.handle_ended(handle).await;
        match action {
            EndedAction::Stale => {}
            EndedAction::Finished(kind) => debug!(channel = %kind, "channel finished"),
            EndedAction::Looped(kind) => trace!(channel = %kind, "channel looped"),
        }
        action
    }

    /// Stop everything and release the backend streams
    pub fn shutdown(&mut self) {
        if self.session.is_active() {
            self.halt();
        }
        self.mixer.close_all();
        self.publish();
        info!("session shut down");
    }
}
