//! Backoff policies for contended transfers
//!
//! Two callers that collide and sleep for the same interval collide again,
//! so the production policies are jittered. [`FixedBackoff`] is for tests.

use std::time::Duration;

use rand::Rng;

use crate::ports::BackoffPolicy;

/// Uniformly random delay in `[min, max]`
#[derive(Debug, Clone, Copy)]
pub struct UniformJitter {
    min: Duration,
    max: Duration,
}

impl UniformJitter {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

impl BackoffPolicy for UniformJitter {
    fn delay(&self, _attempt: u32) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

/// Exponential backoff with "equal jitter"
///
/// The ceiling doubles per attempt (`base * 2^(attempt-1)`, capped at
/// `cap`) and the delay is drawn from `[ceiling/2, ceiling]`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialJitter {
    base: Duration,
    cap: Duration,
}

impl ExponentialJitter {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    fn ceiling_ms(&self, attempt: u32) -> u64 {
        let base = self.base.as_millis() as u64;
        let cap = self.cap.as_millis() as u64;
        let shift = attempt.saturating_sub(1).min(32);
        base.saturating_mul(1u64 << shift).min(cap)
    }
}

impl BackoffPolicy for ExponentialJitter {
    fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_ms(attempt);
        Duration::from_millis(rand::thread_rng().gen_range(ceiling / 2..=ceiling))
    }

    fn name(&self) -> &'static str {
        "exponential"
    }
}

/// Always the same delay
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedBackoff(pub Duration);

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_stays_in_range() {
        let policy = UniformJitter::new(Duration::from_millis(100), Duration::from_millis(500));
        for attempt in 1..=200 {
            let delay = policy.delay(attempt);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_uniform_swaps_reversed_bounds() {
        let policy = UniformJitter::new(Duration::from_millis(50), Duration::from_millis(10));
        let delay = policy.delay(1);
        assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(50));
    }

    #[test]
    fn test_uniform_degenerate_range() {
        let policy = UniformJitter::new(Duration::from_millis(20), Duration::from_millis(20));
        assert_eq!(policy.delay(3), Duration::from_millis(20));
    }

    #[test]
    fn test_exponential_ceiling_doubles_then_caps() {
        let policy = ExponentialJitter::new(Duration::from_millis(50), Duration::from_millis(300));
        assert_eq!(policy.ceiling_ms(1), 50);
        assert_eq!(policy.ceiling_ms(2), 100);
        assert_eq!(policy.ceiling_ms(3), 200);
        assert_eq!(policy.ceiling_ms(4), 300);
        assert_eq!(policy.ceiling_ms(60), 300);
    }

    #[test]
    fn test_exponential_delay_within_half_to_full_ceiling() {
        let policy = ExponentialJitter::new(Duration::from_millis(40), Duration::from_secs(10));
        for _ in 0..100 {
            let delay = policy.delay(3);
            assert!(delay >= Duration::from_millis(80));
            assert!(delay <= Duration::from_millis(160));
        }
    }

    #[test]
    fn test_fixed_is_deterministic() {
        let policy = FixedBackoff(Duration::from_millis(7));
        assert_eq!(policy.delay(1), policy.delay(9));
        assert_eq!(policy.name(), "fixed");
    }
}
