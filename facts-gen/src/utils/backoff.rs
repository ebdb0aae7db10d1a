//! Exponential backoff with optional jitter
//!
//! Shared by the gateway client (transport/status retries) and the bus error
//! handler (per-record redelivery).
//!
//! **Delay for retry `n` (1-based):**
//! `initial × multiplier^(n-1)`, capped at `max_delay`, then scaled by a random
//! factor in `[1 - jitter, 1 + jitter]`.

use rand::Rng;
use std::time::Duration;

/// Upper bound applied before jitter
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    jitter: f64,
    max_delay: Duration,
}

impl Backoff {
    pub fn exponential(initial: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            multiplier: multiplier.max(1.0),
            jitter: 0.0,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Randomise each delay by ±`fraction` (clamped to 0..=1)
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `retry` without jitter
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay before retry number `retry`, jitter applied
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter == 0.0 {
            return base;
        }

        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_initial() {
        let backoff = Backoff::exponential(Duration::from_millis(400), 2.0);

        assert_eq!(backoff.delay(1), Duration::from_millis(400));
        assert_eq!(backoff.delay(2), Duration::from_millis(800));
        assert_eq!(backoff.delay(3), Duration::from_millis(1600));
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = Backoff::exponential(Duration::from_secs(1), 2.0)
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(backoff.delay(10), Duration::from_secs(5));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::exponential(Duration::from_millis(1000), 2.0).with_jitter(0.4);

        for _ in 0..200 {
            let delay = backoff.delay(1);
            assert!(delay >= Duration::from_millis(599), "{:?} below -40%", delay);
            assert!(delay <= Duration::from_millis(1401), "{:?} above +40%", delay);
        }
    }

    #[test]
    fn test_multiplier_below_one_is_flat() {
        let backoff = Backoff::exponential(Duration::from_millis(100), 0.5);
        assert_eq!(backoff.delay(4), Duration::from_millis(100));
    }
}
