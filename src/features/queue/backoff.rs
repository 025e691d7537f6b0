//! Retry backoff policy for the offline queue.
//!
//! Delays grow exponentially from a base, are capped, and carry random
//! jitter so that many clients coming back online together do not retry
//! in lockstep.

use chrono::Duration;
use rand::Rng;

/// Smallest jitter magnitude, as a fraction of the computed delay.
const JITTER_MIN: f64 = 0.10;
/// Largest jitter magnitude, as a fraction of the computed delay.
const JITTER_MAX: f64 = 0.25;

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay for the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl BackoffPolicy {
    /// Create a policy with the given base and cap.
    #[must_use]
    pub const fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the next attempt, given the number of failures so far.
    ///
    /// The undithered schedule is `base * 2^(retry_count - 1)` capped at
    /// `max_delay_ms`; the returned delay is that value shifted up or down
    /// by 10-25%.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let capped = self.undithered_ms(retry_count);

        let mut rng = rand::thread_rng();
        let fraction = rng.gen_range(JITTER_MIN..=JITTER_MAX);
        let jitter = capped as f64 * fraction;
        let jittered = if rng.gen_bool(0.5) {
            capped as f64 + jitter
        } else {
            capped as f64 - jitter
        };

        Duration::milliseconds(jittered.round() as i64)
    }

    /// The capped exponential delay without jitter, in milliseconds.
    #[must_use]
    pub fn undithered_ms(&self, retry_count: u32) -> u64 {
        let exponent = retry_count.saturating_sub(1).min(31);
        self.base_delay_ms
            .saturating_mul(1 << exponent)
            .min(self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: BackoffPolicy = BackoffPolicy::new(1000, 30_000);

    fn assert_within_jitter(delay: Duration, center_ms: u64) {
        let ms = delay.num_milliseconds();
        let low = (center_ms as f64 * (1.0 - JITTER_MAX)).floor() as i64;
        let high = (center_ms as f64 * (1.0 + JITTER_MAX)).ceil() as i64;
        assert!(
            ms >= low && ms <= high,
            "delay {ms}ms outside [{low}, {high}]ms"
        );
    }

    #[test]
    fn test_undithered_schedule_doubles() {
        assert_eq!(POLICY.undithered_ms(1), 1000);
        assert_eq!(POLICY.undithered_ms(2), 2000);
        assert_eq!(POLICY.undithered_ms(3), 4000);
        assert_eq!(POLICY.undithered_ms(4), 8000);
        assert_eq!(POLICY.undithered_ms(5), 16_000);
    }

    #[test]
    fn test_undithered_schedule_caps() {
        assert_eq!(POLICY.undithered_ms(6), 30_000);
        assert_eq!(POLICY.undithered_ms(20), 30_000);
        // Huge retry counts must not overflow
        assert_eq!(POLICY.undithered_ms(u32::MAX), 30_000);
    }

    #[test]
    fn test_zero_retries_uses_base() {
        assert_eq!(POLICY.undithered_ms(0), 1000);
    }

    #[test]
    fn test_delays_stay_within_jitter_band() {
        for retry_count in 1..=8 {
            let center = POLICY.undithered_ms(retry_count);
            for _ in 0..10 {
                assert_within_jitter(POLICY.delay_for(retry_count), center);
            }
        }
    }

    #[test]
    fn test_successive_floors_are_monotonic() {
        // The jitter-tolerant floor of each step dominates the previous
        // step's ceiling only in the aggregate; the undithered schedule
        // itself must be non-decreasing.
        let mut previous = 0;
        for retry_count in 1..=10 {
            let current = POLICY.undithered_ms(retry_count);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_jitter_varies() {
        let samples: Vec<i64> = (0..32)
            .map(|_| POLICY.delay_for(3).num_milliseconds())
            .collect();
        let first = samples[0];
        assert!(samples.iter().any(|&s| s != first));
    }
}
