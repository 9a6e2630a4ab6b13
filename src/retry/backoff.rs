//! Capped exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff parameters.
///
/// The delay before retry `n` (one-based) is `min(cap, base * multiplier^(n-1))`
/// plus a uniform jitter of up to `jitter_percent` of that delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound before jitter.
    pub cap: Duration,
    /// Growth factor per retry.
    pub multiplier: u32,
    /// Maximum jitter as a percentage of the delay.
    pub jitter_percent: u8,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            multiplier: 2,
            jitter_percent: 20,
        }
    }
}

impl BackoffPolicy {
    /// Returns the delay before retry `retry` without jitter.
    #[must_use]
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = u64::from(self.multiplier)
            .checked_pow(exponent)
            .unwrap_or(u64::MAX);
        let scaled = millis(self.base).saturating_mul(factor);
        Duration::from_millis(scaled.min(millis(self.cap)))
    }

    /// Returns the jittered delay before retry `retry`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.delay_with(retry, &mut rand::thread_rng())
    }

    /// Returns the jittered delay before retry `retry` using `rng`.
    #[must_use]
    pub fn delay_with<R>(&self, retry: u32, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        let delay = millis(self.base_delay_for(retry));
        let spread = delay
            .saturating_mul(u64::from(self.jitter_percent))
            .checked_div(100)
            .unwrap_or(0);
        let jitter = if spread == 0 {
            0
        } else {
            rng.gen_range(0..=spread)
        };
        Duration::from_millis(delay.saturating_add(jitter))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
