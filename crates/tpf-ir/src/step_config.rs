// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-step runtime tunables.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a step's input buffer behaves once it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackpressureStrategy {
    /// Producers suspend once the bounded buffer is full.
    Buffer,
    /// Items produced while the buffer is full are discarded silently.
    Drop,
}

impl Default for BackpressureStrategy {
    fn default() -> Self {
        BackpressureStrategy::Buffer
    }
}

/// Per-step tunables controlling retry, backoff, and backpressure.
///
/// Defaults mirror the runtime configuration surface (`pipeline.defaults.*`):
/// `retry_limit=3`, `retry_wait=2s`, `max_backoff=30s`, `jitter=false`,
/// `backpressure_buffer_capacity=128`, `backpressure_strategy=BUFFER`,
/// `recover_on_failure=false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StepConfig {
    /// Maximum number of attempts (including the first) before giving up.
    pub retry_limit: u32,
    /// Initial delay before the first retry.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub retry_wait: Duration,
    /// Upper bound on the exponential backoff delay.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub max_backoff: Duration,
    /// Whether to apply up to ±50% jitter to each computed backoff delay.
    pub jitter: bool,
    /// Bounded buffer size applied to this step's input.
    pub backpressure_buffer_capacity: usize,
    /// The strategy applied once the input buffer fills.
    pub backpressure_strategy: BackpressureStrategy,
    /// Whether a dead-letter-queue substitute is emitted after retries are exhausted,
    /// instead of propagating the failure.
    pub recover_on_failure: bool,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_wait: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            jitter: false,
            backpressure_buffer_capacity: 128,
            backpressure_strategy: BackpressureStrategy::default(),
            recover_on_failure: false,
        }
    }
}

impl StepConfig {
    /// Overlays `overrides` on top of `self`, taking any explicitly-overridden field
    /// from `overrides`. Used to compute a step's effective config from profile
    /// defaults plus a per-step override fragment (see [`crate::pipeline_config::PipelineConfig`]).
    #[must_use]
    pub fn merged_with(&self, overrides: &StepConfigOverride) -> Self {
        Self {
            retry_limit: overrides.retry_limit.unwrap_or(self.retry_limit),
            retry_wait: overrides.retry_wait.unwrap_or(self.retry_wait),
            max_backoff: overrides.max_backoff.unwrap_or(self.max_backoff),
            jitter: overrides.jitter.unwrap_or(self.jitter),
            backpressure_buffer_capacity: overrides
                .backpressure_buffer_capacity
                .unwrap_or(self.backpressure_buffer_capacity),
            backpressure_strategy: overrides
                .backpressure_strategy
                .unwrap_or(self.backpressure_strategy),
            recover_on_failure: overrides
                .recover_on_failure
                .unwrap_or(self.recover_on_failure),
        }
    }
}

/// A sparse per-step override fragment, as declared under `pipeline.step."FQN".<tunable>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StepConfigOverride {
    /// Overrides [`StepConfig::retry_limit`].
    pub retry_limit: Option<u32>,
    /// Overrides [`StepConfig::retry_wait`].
    #[serde(with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub retry_wait: Option<Duration>,
    /// Overrides [`StepConfig::max_backoff`].
    #[serde(with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub max_backoff: Option<Duration>,
    /// Overrides [`StepConfig::jitter`].
    pub jitter: Option<bool>,
    /// Overrides [`StepConfig::backpressure_buffer_capacity`].
    pub backpressure_buffer_capacity: Option<usize>,
    /// Overrides [`StepConfig::backpressure_strategy`].
    pub backpressure_strategy: Option<BackpressureStrategy>,
    /// Overrides [`StepConfig::recover_on_failure`].
    pub recover_on_failure: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StepConfig::default();
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.retry_wait, Duration::from_secs(2));
        assert_eq!(config.max_backoff, Duration::from_secs(30));
        assert!(!config.jitter);
        assert_eq!(config.backpressure_buffer_capacity, 128);
        assert_eq!(config.backpressure_strategy, BackpressureStrategy::Buffer);
        assert!(!config.recover_on_failure);
    }

    #[test]
    fn merge_only_applies_explicitly_set_fields() {
        let base = StepConfig::default();
        let overrides = StepConfigOverride {
            retry_limit: Some(5),
            ..Default::default()
        };
        let merged = base.merged_with(&overrides);
        assert_eq!(merged.retry_limit, 5);
        assert_eq!(merged.retry_wait, base.retry_wait);
    }
}
