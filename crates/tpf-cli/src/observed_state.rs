// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The observed state of a running pipeline service, exposed for status reporting.

use serde::Serialize;
use tpf_runtime::health::HealthState;

/// Observed state of the pipeline service hosted by this process.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceState {
    /// The application name declared by the compiled pipeline template.
    pub app_name: String,
    /// The current health-gate state.
    pub health: HealthStateView,
    /// Number of steps in the reconciled runtime order.
    pub step_count: usize,
}

/// A serializable view of [`HealthState`] (which itself carries no `Serialize` impl
/// since it is a pure runtime type with no external representation requirement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStateView {
    /// No readiness probe has resolved yet.
    Pending,
    /// All readiness probes succeeded.
    Healthy,
    /// At least one readiness probe failed.
    Unhealthy,
    /// Step instantiation or probing failed unrecoverably.
    Error,
}

impl From<HealthState> for HealthStateView {
    fn from(state: HealthState) -> Self {
        match state {
            HealthState::Pending => Self::Pending,
            HealthState::Healthy => Self::Healthy,
            HealthState::Unhealthy => Self::Unhealthy,
            HealthState::Error => Self::Error,
        }
    }
}

impl ServiceState {
    /// Builds an observed-state snapshot for a freshly-loaded service.
    #[must_use]
    pub fn new(app_name: String, health: HealthState, step_count: usize) -> Self {
        Self {
            app_name,
            health: health.into(),
            step_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_every_health_state_variant() {
        assert_eq!(HealthStateView::from(HealthState::Pending), HealthStateView::Pending);
        assert_eq!(HealthStateView::from(HealthState::Healthy), HealthStateView::Healthy);
        assert_eq!(HealthStateView::from(HealthState::Unhealthy), HealthStateView::Unhealthy);
        assert_eq!(HealthStateView::from(HealthState::Error), HealthStateView::Error);
    }

    #[test]
    fn serializes_as_json() {
        let state = ServiceState::new("orders".to_string(), HealthState::Healthy, 3);
        let json = serde_json::to_string(&state).expect("serializes");
        assert!(json.contains("\"HEALTHY\""));
        assert!(json.contains("\"orders\""));
    }
}
