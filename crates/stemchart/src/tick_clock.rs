//! Fixed-rate playback clock
//!
//! Produces one position increment per interval while running. The clock
//! knows nothing about where the range ends; the orchestrator decides when a
//! pass is over.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::trace;

pub struct PlaybackClock {
    period: Duration,
    increment: f64,
    /// Present while running
    interval: Option<Interval>,
    ticks: u64,
}

impl PlaybackClock {
    pub fn new(period: Duration, increment: f64) -> Self {
        Self {
            period,
            increment,
            interval: None,
            ticks: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Ticks delivered since the last start
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Start ticking; the first tick lands one period from now.
    ///
    /// Returns false when the clock was already running.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.ticks = 0;
        true
    }

    /// Stop ticking. Returns false when the clock was already stopped.
    pub fn stop(&mut self) -> bool {
        self.interval.take().is_some()
    }

    /// Wait for the next tick and return the position increment.
    ///
    /// Never resolves while stopped. Cancel-safe, so it can sit in a
    /// `select!` next to other event sources.
    pub async fn tick(&mut self) -> f64 {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                self.ticks += 1;
                trace!(tick = self.ticks, "clock tick");
                self.increment
            }
            None => std::future::pending().await,
        }
    }
}
