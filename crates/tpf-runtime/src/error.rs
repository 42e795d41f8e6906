// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The runtime error taxonomy.
//!
//! Run-scoped errors (`Configuration`, `Shape`, `Health`, `KillSwitch`) abort the run
//! immediately and surface to the caller with the offending step name and triggering
//! condition. Per-item errors (`StepFailure`, `CacheMiss`) are scoped to a single item
//! and never abort the run outright; `CancellationRequested` is a clean, non-error
//! termination that propagates downstream.

use miette::Diagnostic;
use std::time::Duration;

/// All errors that can occur while executing a pipeline run.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// Fatal at run start: an invalid ordered-step resource, missing or contradictory
    /// tunables, or a thread-safety/ordering hint combined with an incompatible policy.
    #[error("configuration error: {details}")]
    #[diagnostic(code(tpf_runtime::configuration_error), url(docsrs))]
    Configuration {
        /// A human-readable description of the invalid configuration.
        details: String,
    },

    /// Fatal per run: the runner received an input type it cannot adapt to a step's
    /// declared shape, or a unary call was issued against a streaming pipeline.
    #[error("shape error on step `{step}`: {details}")]
    #[diagnostic(code(tpf_runtime::shape_error), url(docsrs))]
    Shape {
        /// The step at which the unsupported adaptation was attempted.
        step: String,
        /// A human-readable description of the unsupported combination.
        details: String,
    },

    /// Fatal at run start: a dependent-service probe failed or did not complete
    /// within the startup timeout.
    #[error("health gate did not reach HEALTHY: {details}")]
    #[diagnostic(code(tpf_runtime::health_error), url(docsrs))]
    Health {
        /// A human-readable description of the probe failure.
        details: String,
    },

    /// Per item: surfaced from user step code or a downstream call, after retries
    /// per policy are exhausted.
    #[error("step `{step}` failed: {details}")]
    #[diagnostic(code(tpf_runtime::step_failure), url(docsrs))]
    StepFailure {
        /// The step that failed.
        step: String,
        /// A human-readable description of the failure.
        details: String,
        /// The number of attempts made, including the first, before surfacing.
        attempts: u32,
    },

    /// Per item, under `REQUIRE_CACHE`: no cache-hit status was recorded for this hop.
    #[error("cache miss on a REQUIRE_CACHE item")]
    #[diagnostic(code(tpf_runtime::cache_miss), url(docsrs))]
    CacheMiss,

    /// Fatal mid-run: the retry-amplification guard fired.
    #[error(
        "kill-switch triggered on step `{step}`: observed inflight slope {observed_slope} > threshold, retry rate {observed_retry_rate} > threshold over {window:?}"
    )]
    #[diagnostic(code(tpf_runtime::kill_switch_triggered), url(docsrs))]
    KillSwitchTriggered {
        /// The step whose amplification tripped the guard.
        step: String,
        /// The observed in-flight slope over the configured window.
        observed_slope: f64,
        /// The observed retry rate over the configured window.
        observed_retry_rate: f64,
        /// The rolling window the observation was computed over.
        window: Duration,
    },

    /// Clean, non-error termination; propagates downstream with no further emissions.
    #[error("cancellation requested")]
    #[diagnostic(code(tpf_runtime::cancellation_requested), url(docsrs))]
    CancellationRequested,
}

impl RuntimeError {
    /// Whether this error aborts the whole run, as opposed to being scoped to a
    /// single item.
    #[must_use]
    pub fn is_run_scoped(&self) -> bool {
        matches!(
            self,
            RuntimeError::Configuration { .. }
                | RuntimeError::Shape { .. }
                | RuntimeError::Health { .. }
                | RuntimeError::KillSwitchTriggered { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_scoped_errors_are_classified_correctly() {
        assert!(RuntimeError::Configuration {
            details: String::new()
        }
        .is_run_scoped());
        assert!(!RuntimeError::CacheMiss.is_run_scoped());
        assert!(!RuntimeError::CancellationRequested.is_run_scoped());
    }
}
