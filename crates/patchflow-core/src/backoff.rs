//! Jittered exponential backoff schedule for whole-invocation retries.
//!
//! Waits are drawn uniformly from an exponentially growing envelope clamped
//! to `[min, max]` seconds, so concurrent invocations retrying at the same
//! time spread out instead of forming a synchronized retry storm.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounds of the retry-wait envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSchedule {
    /// Smallest possible wait, in seconds.
    pub min_secs: u64,
    /// Largest possible wait, in seconds.
    pub max_secs: u64,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            min_secs: 30,
            max_secs: 600,
        }
    }
}

impl BackoffSchedule {
    /// Wait for a 1-based attempt number: uniform draw from
    /// `[min, clamp(min * 2^(attempt-1), min, max)]`.
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let upper = self
            .min_secs
            .saturating_mul(1u64 << exponent)
            .clamp(self.min_secs, self.max_secs);

        let secs = if upper > self.min_secs {
            rand::thread_rng().gen_range(self.min_secs..=upper)
        } else {
            self.min_secs
        };
        Duration::from_secs(secs)
    }
}
