use std::time::Duration;

use serde::Deserialize;

/// Where the driver waits. Swapped for a recording clock in tests.
pub trait Sleeper {
    fn sleep(&mut self, dur: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, dur: Duration) {
        if !dur.is_zero() {
            std::thread::sleep(dur);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per chunk before it is abandoned.
    pub max_attempts: u32,
    pub backoff_step_secs: u64,
    pub success_pause_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_secs: 2,
            success_pause_secs: 1,
        }
    }
}

impl RetryPolicy {
    /// Linear backoff after the `failed_attempts`-th failure.
    #[must_use]
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        Duration::from_secs(self.backoff_step_secs.saturating_mul(u64::from(failed_attempts)))
    }

    #[must_use]
    pub fn success_pause(&self) -> Duration {
        Duration::from_secs(self.success_pause_secs)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
