//! Retry decision logic shared by all upload workers.

use std::time::Duration;

use rand::Rng;

use crate::error::UploadError;

/// Cap on the exponential backoff.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Decision returned by the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the job after the delay.
    Retry(Duration),
    /// Give up; the job is terminally failed.
    Stop,
}

/// Exponential-backoff retry policy.
///
/// A pure function of (attempts made, error class). Rejected requests stop
/// immediately; transient errors retry with `base * 2^(attempts-1)` capped
/// at a maximum, plus up to 10% jitter so mass failures do not retry in
/// lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` total attempts per job.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Decide what to do after attempt number `attempts_made` failed.
    #[must_use]
    pub fn decide(&self, attempts_made: u32, error: &UploadError) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::Stop;
        }
        if attempts_made >= self.max_attempts {
            return RetryDecision::Stop;
        }
        RetryDecision::Retry(self.backoff(attempts_made))
    }

    fn backoff(&self, attempts_made: u32) -> Duration {
        let exponent = attempts_made.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        let jitter = delay.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
        delay + jitter
    }
}
