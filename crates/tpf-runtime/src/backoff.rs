// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff with an optional jitter, as applied between retry attempts.

use rand::Rng;
use std::time::Duration;

/// Computes the delay before the `retry_count`-th retry (1-indexed: the delay before
/// the first retry uses `retry_count = 1`), given the step's configured
/// `retry_wait`/`max_backoff`, doubling each attempt and capping at `max_backoff`.
#[must_use]
pub fn compute_delay(retry_count: u32, retry_wait: Duration, max_backoff: Duration) -> Duration {
    let base_ms = retry_wait.as_millis() as f64;
    let capped_ms = max_backoff.as_millis() as f64;
    let multiplier = 2.0_f64;
    let delay_ms = (base_ms * multiplier.powi(retry_count.saturating_sub(1) as i32)).min(capped_ms);
    Duration::from_millis(delay_ms as u64)
}

/// Applies up to ±50% jitter to `delay`, per the step's `jitter` flag.
#[must_use]
pub fn apply_jitter(delay: Duration, jitter: bool) -> Duration {
    if !jitter {
        return delay;
    }
    let factor = rand::rng().random_range(0.5..=1.5);
    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_each_attempt_until_capped() {
        let wait = Duration::from_millis(10);
        let cap = Duration::from_millis(100);
        assert_eq!(compute_delay(1, wait, cap), Duration::from_millis(10));
        assert_eq!(compute_delay(2, wait, cap), Duration::from_millis(20));
        assert_eq!(compute_delay(3, wait, cap), Duration::from_millis(40));
        assert_eq!(compute_delay(4, wait, cap), Duration::from_millis(80));
        assert_eq!(compute_delay(5, wait, cap), Duration::from_millis(100));
        assert_eq!(compute_delay(10, wait, cap), Duration::from_millis(100));
    }

    #[test]
    fn jitter_disabled_is_identity() {
        let delay = Duration::from_millis(40);
        assert_eq!(apply_jitter(delay, false), delay);
    }

    #[test]
    fn jitter_enabled_stays_within_fifty_percent_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            let jittered = apply_jitter(delay, true);
            assert!(jittered >= Duration::from_millis(50));
            assert!(jittered <= Duration::from_millis(150));
        }
    }
}
