//! Clock utilities for gaze-sample timestamping.
//!
//! Samples carry wall-clock epoch milliseconds, but wall clocks can step
//! backwards (NTP). A [`SessionClock`] anchors the wall epoch once at
//! session start and derives every subsequent timestamp from the monotonic
//! clock, so timestamps within one session are non-decreasing.

use std::time::{Duration, Instant};

/// A per-session clock producing monotonically non-decreasing epoch-ms
/// timestamps.
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock epoch milliseconds at session start.
    epoch_wall_ms: i64,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a clock from a known anchor (for replaying saved sessions).
    pub fn from_anchor(epoch: Instant, epoch_wall_ms: i64) -> Self {
        Self {
            epoch,
            epoch_wall_ms,
        }
    }

    /// Current timestamp in epoch milliseconds, derived from the
    /// monotonic clock.
    pub fn now_ms(&self) -> i64 {
        self.epoch_wall_ms + self.epoch.elapsed().as_millis() as i64
    }

    /// Wall-clock epoch milliseconds at session start.
    pub fn epoch_wall_ms(&self) -> i64 {
        self.epoch_wall_ms
    }

    /// Time elapsed since session start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Seconds elapsed since session start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}
