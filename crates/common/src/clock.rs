//! Clock utilities for recording sessions.
//!
//! A recording is anchored to a monotonic epoch captured at start. Two
//! durations are tracked from it:
//! - wall elapsed: real time since start, used for minimum-duration checks
//! - active elapsed: wall elapsed minus time spent paused
//!
//! The clock reads `tokio::time::Instant` so paused-time tests drive it.

use std::time::Duration;

use tokio::time::Instant;

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,

    /// Start of the current pause, if paused.
    paused_at: Option<Instant>,

    /// Total time spent in completed pauses.
    paused_total: Duration,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Real time since the epoch, pauses included.
    pub fn wall_elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Time spent actively recording.
    pub fn active_elapsed(&self) -> Duration {
        let current_pause = self
            .paused_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO);
        self.wall_elapsed()
            .saturating_sub(self.paused_total + current_pause)
    }

    /// How much longer the recording must run to reach `minimum` wall time.
    pub fn remaining_until(&self, minimum: Duration) -> Duration {
        minimum.saturating_sub(self.wall_elapsed())
    }

    /// Mark the start of a pause. Ignored if already paused.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// End the current pause. Ignored if not paused.
    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }

    /// Whether a pause is in progress.
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}
