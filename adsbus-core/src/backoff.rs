//! Exponential backoff schedule for connector/listener retry, and the
//! corresponding "timer wheel" of the distilled spec. Since connection
//! attempts in this implementation are driven by `tokio::time::sleep`
//! directly, the only piece worth factoring out on its own -- and
//! worth testing for the monotonicity property in spec §8 -- is the
//! delay computation itself.

use std::time::Duration;

/// Base delay for the first retry attempt.
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on retry delay ("on the order of minutes" per spec §4.2).
const DELAY_CAP: Duration = Duration::from_secs(300);

/// Returns the delay to wait before the `attempt`'th retry (0-indexed;
/// attempt 0 is the first retry, and returns the shortest delay).
/// Doubles per attempt and saturates at `DELAY_CAP`.
pub fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
    let millis = (BASE_DELAY.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis(millis).min(DELAY_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_zero_is_base_delay() {
        assert_eq!(retry_delay(0), BASE_DELAY);
    }

    #[test]
    fn doubles_per_attempt_until_capped() {
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn monotonic_and_capped() {
        let mut prev = retry_delay(0);
        for attempt in 1..40 {
            let next = retry_delay(attempt);
            assert!(next >= prev, "retry_delay must be non-decreasing");
            assert!(next <= DELAY_CAP);
            prev = next;
        }
    }
}
