//! Reconnect backoff policy.

use std::time::Duration;

use rand::Rng;

use crate::constants::{RETRY_BASE_DELAY, RETRY_JITTER, RETRY_MAX_DELAY};

/// Bounded exponential backoff with jitter.
///
/// `delay(n) = min(cap, base · 2ⁿ) · (1 + U[−jitter, +jitter])`
///
/// The attempt counter is owned by [`crate::connection::Connection`] and
/// resets on every successful connect.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay of the first retry attempt.
    pub base: Duration,
    /// Upper bound on the computed delay (before jitter).
    pub cap: Duration,
    /// Relative jitter applied to every delay (`0.1` = ±10 %).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: RETRY_BASE_DELAY,
            cap: RETRY_MAX_DELAY,
            jitter: RETRY_JITTER,
        }
    }
}

impl RetryPolicy {
    /// An immediate-retry policy (zero delay, no jitter). Useful for tests
    /// and local endpoints.
    pub fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            cap: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Compute the delay before retry attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^attempt saturates well past any realistic cap.
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        let exp = self
            .base
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap);

        if self.jitter <= 0.0 || exp.is_zero() {
            return exp;
        }

        let spread = rand::rng().random_range(-self.jitter..=self.jitter);
        exp.mul_f64((1.0 + spread).max(0.0))
    }
}
