//! Chart data for one channel
//!
//! Each channel gets an evenly spaced run of points across the playback
//! range. A point is *revealed* once the playback cursor has reached it;
//! reveal only moves forward until the next session restart.

use rand::Rng;
use serde::Serialize;

use crate::channel::{ChannelKind, Rgba};

/// A single chart point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackPoint {
    /// Location along the playback axis
    pub position: f64,
    /// Height of the point, fixed at generation
    pub value: f64,
    /// Whether the cursor has passed this point
    pub revealed: bool,
}

impl TrackPoint {
    /// Color the renderer should use for this point
    pub fn color(&self, kind: ChannelKind) -> Rgba {
        let style = kind.style();
        if self.revealed {
            style.revealed
        } else {
            style.pending
        }
    }
}

/// Ordered chart points for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    kind: ChannelKind,
    points: Vec<TrackPoint>,
}

impl Track {
    /// Generate `count` points spread over `[0, max_position)`.
    ///
    /// Values sit on the channel's baseline plus an integer jitter drawn from
    /// `[-jitter, jitter)`.
    pub fn generate<R: Rng>(
        kind: ChannelKind,
        count: usize,
        max_position: f64,
        jitter: i32,
        rng: &mut R,
    ) -> Self {
        let step = if count == 0 { 0.0 } else { max_position / count as f64 };
        let baseline = kind.style().baseline;

        let points = (0..count)
            .map(|i| {
                let offset = if jitter > 0 {
                    rng.random_range(-jitter..jitter)
                } else {
                    0
                };
                TrackPoint {
                    position: i as f64 * step,
                    value: baseline + f64::from(offset),
                    revealed: false,
                }
            })
            .collect();

        Self { kind, points }
    }

    /// Build a track from explicit points (sorted by position)
    pub fn from_points(kind: ChannelKind, mut points: Vec<TrackPoint>) -> Self {
        points.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { kind, points }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Reveal every point at or before `position`.
    ///
    /// Never un-reveals. Returns how many points changed.
    pub fn reveal_up_to(&mut self, position: f64) -> usize {
        let mut changed = 0;
        for point in self.points.iter_mut() {
            if point.position > position {
                break;
            }
            if !point.revealed {
                point.revealed = true;
                changed += 1;
            }
        }
        changed
    }

    /// Hide every point again (session restart)
    pub fn reset_reveal(&mut self) {
        for point in self.points.iter_mut() {
            point.revealed = false;
        }
    }

    pub fn revealed_count(&self) -> usize {
        self.points.iter().filter(|p| p.revealed).count()
    }

    /// True when reveal state is exactly "cursor has reached the point"
    pub fn is_consistent_with(&self, position: f64) -> bool {
        self.points
            .iter()
            .all(|p| p.revealed == (position >= p.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(0x5EED)
    }

    #[test]
    fn test_generate_spacing() {
        let track = Track::generate(ChannelKind::Drums, 200, 10.5, 5, &mut seeded());

        assert_eq!(track.len(), 200);
        assert_eq!(track.points()[0].position, 0.0);
        let step = 10.5 / 200.0;
        assert!((track.points()[1].position - step).abs() < 1e-12);
        assert!(track.points().last().unwrap().position < 10.5);
    }

    #[test]
    fn test_generate_values_within_jitter() {
        for kind in ChannelKind::ALL {
            let track = Track::generate(kind, 200, 10.5, 5, &mut seeded());
            let baseline = kind.style().baseline;
            for point in track.points() {
                assert!(point.value >= baseline - 5.0 && point.value < baseline + 5.0);
                assert_eq!(point.value.fract(), 0.0);
                assert!(!point.revealed);
            }
        }
    }

    #[test]
    fn test_generate_is_reproducible_with_seed() {
        let a = Track::generate(ChannelKind::Bass, 50, 10.5, 5, &mut seeded());
        let b = Track::generate(ChannelKind::Bass, 50, 10.5, 5, &mut seeded());
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_jitter_sits_on_baseline() {
        let track = Track::generate(ChannelKind::Vocals, 10, 10.5, 0, &mut seeded());
        assert!(track.points().iter().all(|p| p.value == 100.0));
    }

    #[test]
    fn test_reveal_up_to_is_monotonic() {
        let mut track = Track::generate(ChannelKind::Others, 200, 10.5, 5, &mut seeded());

        let first = track.reveal_up_to(1.0);
        assert!(first > 0);
        assert!(track.is_consistent_with(1.0));

        // Moving the cursor back never hides anything
        assert_eq!(track.reveal_up_to(0.5), 0);
        assert_eq!(track.revealed_count(), first);

        track.reveal_up_to(2.0);
        assert!(track.is_consistent_with(2.0));
    }

    #[test]
    fn test_reveal_includes_point_at_cursor() {
        let mut track = Track::from_points(
            ChannelKind::Drums,
            vec![
                TrackPoint { position: 0.5, value: 1.0, revealed: false },
                TrackPoint { position: 0.0, value: 1.0, revealed: false },
            ],
        );

        assert_eq!(track.points()[0].position, 0.0);
        assert_eq!(track.reveal_up_to(0.0), 1);
        assert_eq!(track.reveal_up_to(0.5), 1);
    }

    #[test]
    fn test_reset_reveal() {
        let mut track = Track::generate(ChannelKind::Drums, 20, 10.5, 5, &mut seeded());
        track.reveal_up_to(10.5);
        assert_eq!(track.revealed_count(), 20);

        track.reset_reveal();
        assert_eq!(track.revealed_count(), 0);
    }

    #[test]
    fn test_point_color_follows_reveal() {
        let mut point = TrackPoint { position: 0.0, value: 10.0, revealed: false };
        assert_eq!(point.color(ChannelKind::Drums).to_hex(), "#4D1060DC");
        point.revealed = true;
        assert_eq!(point.color(ChannelKind::Drums).to_hex(), "#1060DC");
    }
}
