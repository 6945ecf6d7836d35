//! Bootstrap configuration - seeds the playback session at startup.

use serde::{Deserialize, Serialize};

/// Transport timing and output level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Clock period in milliseconds.
    #[serde(default = "PlaybackConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Position units added per tick.
    #[serde(default = "PlaybackConfig::default_tick_increment")]
    pub tick_increment: f64,

    /// End of the playback range. Reaching it ends the session.
    #[serde(default = "PlaybackConfig::default_max_position")]
    pub max_position: f64,

    /// Output level handed to the backend on every start (0.0-1.0).
    #[serde(default = "PlaybackConfig::default_volume")]
    pub volume: f32,

    /// Restart a channel from zero when its media ends.
    #[serde(default = "PlaybackConfig::default_looping")]
    pub looping: bool,
}

impl PlaybackConfig {
    fn default_tick_interval_ms() -> u64 {
        100
    }

    fn default_tick_increment() -> f64 {
        0.22
    }

    fn default_max_position() -> f64 {
        10.5
    }

    fn default_volume() -> f32 {
        0.7
    }

    fn default_looping() -> bool {
        true
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            tick_increment: Self::default_tick_increment(),
            max_position: Self::default_max_position(),
            volume: Self::default_volume(),
            looping: Self::default_looping(),
        }
    }
}

/// How channel audio files are named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// File extension appended to the lower-cased channel name.
    #[serde(default = "AssetConfig::default_extension")]
    pub extension: String,
}

impl AssetConfig {
    fn default_extension() -> String {
        "wav".to_string()
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            extension: Self::default_extension(),
        }
    }
}

/// Shape of the generated chart data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Points generated per channel.
    #[serde(default = "ChartConfig::default_points_per_channel")]
    pub points_per_channel: usize,

    /// Jitter bound; values are drawn from `[-jitter, jitter)` around the baseline.
    #[serde(default = "ChartConfig::default_jitter")]
    pub jitter: i32,

    /// Fixed RNG seed for reproducible charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ChartConfig {
    fn default_points_per_channel() -> usize {
        200
    }

    fn default_jitter() -> i32 {
        5
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            points_per_channel: Self::default_points_per_channel(),
            jitter: Self::default_jitter(),
            seed: None,
        }
    }
}

/// Bootstrap configuration - seeds the session, then the session owns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub assets: AssetConfig,

    #[serde(default)]
    pub chart: ChartConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_defaults() {
        let playback = PlaybackConfig::default();
        assert_eq!(playback.tick_interval_ms, 100);
        assert!((playback.tick_increment - 0.22).abs() < f64::EPSILON);
        assert!((playback.max_position - 10.5).abs() < f64::EPSILON);
        assert!((playback.volume - 0.7).abs() < f32::EPSILON);
        assert!(playback.looping);
    }

    #[test]
    fn test_chart_defaults() {
        let chart = ChartConfig::default();
        assert_eq!(chart.points_per_channel, 200);
        assert_eq!(chart.jitter, 5);
        assert_eq!(chart.seed, None);
    }

    #[test]
    fn test_asset_defaults() {
        assert_eq!(AssetConfig::default().extension, "wav");
    }
}
