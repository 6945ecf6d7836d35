//! Playback session state
//!
//! Everything the orchestrator publishes lives here: the cursor, transport
//! state, per-channel intent and chart tracks. `SessionSnapshot` is the
//! immutable copy handed to observers.

use serde::Serialize;

use crate::channel::{ChannelKind, PerChannel};
use crate::mixer::Availability;
use crate::track::{Track, TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    #[default]
    Idle,
    Playing,
}

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    position: f64,
    max_position: f64,
    state: TransportState,
    enabled: PerChannel<bool>,
    tracks: PerChannel<Track>,
}

impl PlaybackSession {
    /// Fresh session: every channel enabled, cursor at zero, idle
    pub fn new(tracks: PerChannel<Track>, max_position: f64) -> Self {
        Self {
            position: 0.0,
            max_position,
            state: TransportState::Idle,
            enabled: PerChannel::splat(true),
            tracks,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn max_position(&self) -> f64 {
        self.max_position
    }

    /// Move the cursor, clamped to the playback range
    pub fn set_position(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.max_position);
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn set_state(&mut self, state: TransportState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Transport "play" is offered whenever the session is idle
    pub fn play_enabled(&self) -> bool {
        !self.is_active()
    }

    pub fn stop_enabled(&self) -> bool {
        self.is_active()
    }

    pub fn enabled(&self) -> &PerChannel<bool> {
        &self.enabled
    }

    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        self.enabled[kind]
    }

    /// Returns false when the flag already had that value
    pub fn set_enabled(&mut self, kind: ChannelKind, enabled: bool) -> bool {
        if self.enabled[kind] == enabled {
            return false;
        }
        self.enabled[kind] = enabled;
        true
    }

    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        self.enabled.kinds_where(|on| *on)
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled.values().any(|on| *on)
    }

    pub fn track(&self, kind: ChannelKind) -> &Track {
        &self.tracks[kind]
    }

    pub fn tracks(&self) -> &PerChannel<Track> {
        &self.tracks
    }

    /// Reveal points at or before `position` on one channel
    pub fn reveal_channel(&mut self, kind: ChannelKind, position: f64) -> usize {
        self.tracks[kind].reveal_up_to(position)
    }

    /// Reveal points at or before `position` on every channel
    pub fn reveal_all(&mut self, position: f64) -> usize {
        self.tracks
            .iter_mut()
            .map(|(_, track)| track.reveal_up_to(position))
            .sum()
    }

    pub fn reset_reveal(&mut self) {
        for (_, track) in self.tracks.iter_mut() {
            track.reset_reveal();
        }
    }

    pub fn snapshot(
        &self,
        looping: bool,
        availability: impl Fn(ChannelKind) -> Availability,
    ) -> SessionSnapshot {
        SessionSnapshot {
            position: self.position,
            max_position: self.max_position,
            state: self.state,
            active: self.is_active(),
            play_enabled: self.play_enabled(),
            stop_enabled: self.stop_enabled(),
            looping,
            channels: ChannelKind::ALL
                .into_iter()
                .map(|kind| ChannelView {
                    kind,
                    enabled: self.enabled[kind],
                    availability: availability(kind),
                    points: self.tracks[kind].points().to_vec(),
                })
                .collect(),
        }
    }
}

/// Published view of one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelView {
    pub kind: ChannelKind,
    pub enabled: bool,
    pub availability: Availability,
    pub points: Vec<TrackPoint>,
}

impl ChannelView {
    pub fn available(&self) -> bool {
        self.availability.is_ready()
    }

    pub fn revealed_count(&self) -> usize {
        self.points.iter().filter(|p| p.revealed).count()
    }
}

/// Full published state, replaced wholesale on every update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub position: f64,
    pub max_position: f64,
    pub state: TransportState,
    pub active: bool,
    pub play_enabled: bool,
    pub stop_enabled: bool,
    /// Loop-on-end for channels whose media runs out
    pub looping: bool,
    pub channels: Vec<ChannelView>,
}

impl SessionSnapshot {
    pub fn channel(&self, kind: ChannelKind) -> &ChannelView {
        &self.channels[kind.index()]
    }

    /// Fraction of the range covered by the cursor, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.max_position <= 0.0 {
            0.0
        } else {
            (self.position / self.max_position).clamp(0.0, 1.0)
        }
    }

    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        self.channels
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.kind)
            .collect()
    }

    /// True when every channel's reveal state matches the cursor exactly
    pub fn reveal_consistent(&self) -> bool {
        self.channels.iter().all(|c| {
            c.points
                .iter()
                .all(|p| p.revealed == (self.position >= p.position))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session() -> PlaybackSession {
        let mut rng = StdRng::seed_from_u64(7);
        let tracks = PerChannel::from_fn(|kind| Track::generate(kind, 20, 10.5, 5, &mut rng));
        PlaybackSession::new(tracks, 10.5)
    }

    #[test]
    fn test_new_session_defaults() {
        let session = session();
        assert_eq!(session.position(), 0.0);
        assert_eq!(session.state(), TransportState::Idle);
        assert_eq!(session.enabled_channels(), ChannelKind::ALL.to_vec());
        assert!(session.play_enabled());
        assert!(!session.stop_enabled());
    }

    #[test]
    fn test_set_enabled_reports_change() {
        let mut session = session();
        assert!(!session.set_enabled(ChannelKind::Bass, true));
        assert!(session.set_enabled(ChannelKind::Bass, false));
        assert!(!session.is_enabled(ChannelKind::Bass));

        for kind in ChannelKind::ALL {
            session.set_enabled(kind, false);
        }
        assert!(!session.any_enabled());
    }

    #[test]
    fn test_position_is_clamped() {
        let mut session = session();
        session.set_position(11.0);
        assert_eq!(session.position(), 10.5);
        session.set_position(-1.0);
        assert_eq!(session.position(), 0.0);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut session = session();
        session.set_state(TransportState::Playing);
        session.set_enabled(ChannelKind::Others, false);
        session.set_position(2.0);
        session.reveal_all(2.0);

        let snapshot = session.snapshot(true, |kind| {
            if kind == ChannelKind::Vocals {
                Availability::Unavailable { reason: "missing".into() }
            } else {
                Availability::Ready
            }
        });

        assert!(snapshot.active);
        assert!(snapshot.stop_enabled && !snapshot.play_enabled);
        assert!(!snapshot.channel(ChannelKind::Others).enabled);
        assert!(!snapshot.channel(ChannelKind::Vocals).available());
        assert!(snapshot.reveal_consistent());
        assert!((snapshot.progress() - 2.0 / 10.5).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = session().snapshot(false, |_| Availability::Ready);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["state"], "idle");
        assert_eq!(json["looping"], false);
        assert_eq!(json["channels"][0]["kind"], "drums");
        assert_eq!(json["channels"][0]["availability"]["state"], "ready");
        assert_eq!(json["channels"][3]["points"].as_array().unwrap().len(), 20);
    }
}
