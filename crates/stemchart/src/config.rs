//! Validated engine configuration
//!
//! `stemconf` deals in raw file/env values; this is the shape the session
//! actually runs on.

use std::time::Duration;

use stemconf::StemConfig;

use crate::error::{Result, SessionError};

/// Default clock interval between ticks
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Default position advance per tick
pub const TICK_INCREMENT: f64 = 0.22;
/// Default end of the playback range
pub const MAX_POSITION: f64 = 10.5;
/// Default chart points per channel
pub const POINTS_PER_CHANNEL: usize = 200;
/// Default half-width of value jitter
pub const JITTER: i32 = 5;
/// Default output level for every channel
pub const VOLUME: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub tick_interval: Duration,
    pub tick_increment: f64,
    pub max_position: f64,
    pub points_per_channel: usize,
    pub jitter: i32,
    pub volume: f32,
    pub looping: bool,
    /// Fixed RNG seed for chart generation (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            tick_increment: TICK_INCREMENT,
            max_position: MAX_POSITION,
            points_per_channel: POINTS_PER_CHANNEL,
            jitter: JITTER,
            volume: VOLUME,
            looping: true,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(invalid("tick interval must be positive"));
        }
        if !(self.tick_increment.is_finite() && self.tick_increment > 0.0) {
            return Err(invalid(format!(
                "tick increment must be positive, got {}",
                self.tick_increment
            )));
        }
        if !(self.max_position.is_finite() && self.max_position > 0.0) {
            return Err(invalid(format!(
                "max position must be positive, got {}",
                self.max_position
            )));
        }
        if self.points_per_channel == 0 {
            return Err(invalid("points per channel must be at least 1"));
        }
        if self.jitter < 0 {
            return Err(invalid(format!("jitter must not be negative, got {}", self.jitter)));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(invalid(format!("volume must be within 0..=1, got {}", self.volume)));
        }
        Ok(())
    }

    /// Ticks from zero until the cursor reaches the end of the range
    pub fn ticks_per_pass(&self) -> u64 {
        (self.max_position / self.tick_increment).ceil() as u64
    }
}

fn invalid(message: impl Into<String>) -> SessionError {
    SessionError::InvalidConfig(message.into())
}

impl From<&StemConfig> for SessionConfig {
    fn from(config: &StemConfig) -> Self {
        let playback = &config.bootstrap.playback;
        let chart = &config.bootstrap.chart;
        Self {
            tick_interval: Duration::from_millis(playback.tick_interval_ms),
            tick_increment: playback.tick_increment,
            max_position: playback.max_position,
            points_per_channel: chart.points_per_channel,
            jitter: chart.jitter,
            volume: playback.volume,
            looping: playback.looping,
            seed: chart.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.ticks_per_pass(), 48);
    }

    #[test]
    fn test_from_stem_config_matches_defaults() {
        let config = SessionConfig::from(&StemConfig::default());
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases = [
            SessionConfig { tick_interval: Duration::ZERO, ..Default::default() },
            SessionConfig { tick_increment: 0.0, ..Default::default() },
            SessionConfig { max_position: -1.0, ..Default::default() },
            SessionConfig { points_per_channel: 0, ..Default::default() },
            SessionConfig { jitter: -2, ..Default::default() },
            SessionConfig { volume: 1.5, ..Default::default() },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(SessionError::InvalidConfig(_))),
                "{config:?} should be rejected"
            );
        }
    }
}
