//! Retry budget and capped exponential backoff

use crate::error::{CliError, Result};
use rand::Rng;
use std::time::Duration;

/// Default attempts per chunk
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default cap on any single wait
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default jitter as a fraction of the exponential delay
pub const DEFAULT_JITTER_RATIO: f64 = 0.2;

/// Per-chunk retry policy.
///
/// The nominal wait after failed attempt `n` is
/// `d = min(max_delay, base_delay * 2^(n-1))`. Jitter spreads it:
///
/// - below the cap, uniformly over `[d, min(d * (1 + jitter_ratio), max_delay)]`
/// - at the cap, uniformly over `[max_delay * (1 - jitter_ratio), max_delay]`
///
/// Jittered waits are therefore always bounded by `max_delay` and
/// non-decreasing until the cap is reached. Past it they vary within the
/// capped window, so chunks that hit the cap together do not retry in step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl RetryPolicy {
    /// Validated policy with the default jitter ratio.
    ///
    /// Requires `max_attempts >= 1`, `base_delay > 0` and `max_delay >= base_delay`.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(CliError::config("max_attempts must be at least 1"));
        }
        if base_delay.is_zero() {
            return Err(CliError::config("base_delay must be greater than zero"));
        }
        if max_delay < base_delay {
            return Err(CliError::config(format!(
                "max_delay ({:?}) must be >= base_delay ({:?})",
                max_delay, base_delay
            )));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        })
    }

    /// Replace the jitter ratio; must lie in `[0, 1]`
    pub fn with_jitter(mut self, ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(CliError::config(format!(
                "jitter ratio must be between 0 and 1, got {ratio}"
            )));
        }
        self.jitter_ratio = ratio;
        Ok(self)
    }

    /// Same policy with jitter disabled
    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_ratio(&self) -> f64 {
        self.jitter_ratio
    }

    /// Un-jittered wait after failed attempt `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        1u32.checked_shl(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Jittered wait after failed attempt `attempt`, drawing from `rng`
    pub fn jittered_delay<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.spread(self.backoff_delay(attempt), rng)
    }

    /// Wait before the attempt following failed attempt `attempt`.
    ///
    /// A server hint (`Retry-After`) raises the nominal wait, which is then
    /// jittered like any other delay and never exceeds `max_delay`.
    pub fn next_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        self.next_delay_with(attempt, retry_after, &mut rand::thread_rng())
    }

    /// [`Self::next_delay`] drawing from `rng`
    pub fn next_delay_with<R: Rng>(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let nominal = match retry_after {
            Some(hint) => self.backoff_delay(attempt).max(hint),
            None => self.backoff_delay(attempt),
        };
        self.spread(nominal, rng)
    }

    fn spread<R: Rng>(&self, nominal: Duration, rng: &mut R) -> Duration {
        if nominal >= self.max_delay {
            // Float rounding must not push the span past one full delay
            let span = self.max_delay.mul_f64(self.jitter_ratio).min(self.max_delay);
            return uniform(self.max_delay - span, self.max_delay, rng);
        }

        let span = nominal.mul_f64(self.jitter_ratio).min(nominal);
        uniform(nominal, nominal.saturating_add(span).min(self.max_delay), rng)
    }
}

/// Uniform draw from `[low, high]` at nanosecond resolution
fn uniform<R: Rng>(low: Duration, high: Duration, rng: &mut R) -> Duration {
    if high <= low {
        return low;
    }
    let width = u64::try_from((high - low).as_nanos()).unwrap_or(u64::MAX);
    low + Duration::from_nanos(rng.gen_range(0..=width))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_validation() {
        assert!(RetryPolicy::new(0, secs(1), secs(10)).is_err());
        assert!(RetryPolicy::new(3, Duration::ZERO, secs(10)).is_err());
        assert!(RetryPolicy::new(3, secs(5), secs(1)).is_err());
        assert!(RetryPolicy::new(1, secs(1), secs(1)).is_ok());

        let policy = RetryPolicy::new(3, secs(1), secs(10)).unwrap();
        assert!(policy.with_jitter(1.5).is_err());
        assert!(policy.with_jitter(-0.1).is_err());
        assert_eq!(policy.with_jitter(0.5).unwrap().jitter_ratio(), 0.5);
    }

    #[test]
    fn test_backoff_sequence_doubles_then_caps() {
        let policy = RetryPolicy::new(10, secs(1), secs(10)).unwrap();
        let delays: Vec<u64> = (1..=7).map(|n| policy.backoff_delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10, 10]);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::new(u32::MAX, secs(1), secs(30)).unwrap();
        assert_eq!(policy.backoff_delay(40), secs(30));
        assert_eq!(policy.backoff_delay(u32::MAX), secs(30));
    }

    #[test]
    fn test_jittered_delays_non_decreasing_until_cap() {
        let policy = RetryPolicy::new(20, Duration::from_millis(100), secs(5))
            .unwrap()
            .with_jitter(1.0)
            .unwrap();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut previous = Duration::ZERO;
            // 100ms * 2^5 = 3.2s is the last uncapped step
            for attempt in 1..=6 {
                let delay = policy.jittered_delay(attempt, &mut rng);
                assert!(delay >= previous, "seed={seed} attempt={attempt}");
                assert!(delay >= policy.backoff_delay(attempt));
                assert!(delay <= policy.max_delay());
                previous = delay;
            }
        }
    }

    #[test]
    fn test_capped_delays_keep_jitter() {
        let policy = RetryPolicy::new(10, secs(1), secs(10))
            .unwrap()
            .with_jitter(0.2)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let capped: Vec<Duration> = (0..20).map(|_| policy.jittered_delay(8, &mut rng)).collect();
        for delay in &capped {
            assert!(*delay >= secs(8) && *delay <= secs(10), "{delay:?}");
        }
        assert!(capped.iter().any(|d| *d != capped[0]), "capped delays were all identical");
    }

    #[test]
    fn test_retry_after_hint_is_jittered_above_the_hint() {
        let policy = RetryPolicy::new(5, secs(1), secs(30))
            .unwrap()
            .with_jitter(0.5)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let delays: Vec<Duration> = (0..20)
            .map(|_| policy.next_delay_with(1, Some(secs(4)), &mut rng))
            .collect();
        for delay in &delays {
            assert!(*delay >= secs(4) && *delay <= secs(6), "{delay:?}");
        }
        assert!(delays.iter().any(|d| *d != delays[0]), "hinted delays were all identical");
    }

    #[test]
    fn test_without_jitter_is_exact() {
        let policy = RetryPolicy::new(5, secs(2), secs(60)).unwrap().without_jitter();
        assert_eq!(policy.next_delay(3, None), secs(8));
    }

    #[test]
    fn test_retry_after_is_honoured_and_capped() {
        let policy = RetryPolicy::new(5, secs(1), secs(10)).unwrap().without_jitter();
        assert_eq!(policy.next_delay(1, Some(secs(4))), secs(4));
        assert_eq!(policy.next_delay(1, Some(secs(120))), secs(10));
        // A shorter hint never shortens the computed backoff
        assert_eq!(policy.next_delay(3, Some(secs(1))), secs(4));
    }
}
