// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The canonical, build-time-emitted ordering of step names.

use crate::StepName;
use serde::{Deserialize, Serialize};

/// Canonical path the ordered-step resource is emitted to and loaded from at startup.
pub const RESOURCE_PATH: &str = "META-INF/pipeline/order.json";

/// Canonical path the orchestrator client wiring resource is emitted to.
pub const ORCHESTRATOR_CLIENTS_RESOURCE_PATH: &str = "META-INF/pipeline/orchestrator-clients.properties";

/// Config-source precedence ordinal for the orchestrator client wiring resource: it
/// overrides application defaults but is itself overridden by environment variables.
pub const ORCHESTRATOR_CLIENTS_CONFIG_ORDINAL: i32 = 90;

/// The pipeline's ordered list of fully-qualified step class names, as emitted by
/// Order Emission (including synthetic side-effect steps inserted by aspect expansion)
/// and consumed at startup by the Pipeline Runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedStepList {
    steps: Vec<StepName>,
}

impl OrderedStepList {
    /// Builds an ordered step list from an explicit sequence.
    #[must_use]
    pub fn new(steps: Vec<StepName>) -> Self {
        Self { steps }
    }

    /// The step names in canonical order.
    #[must_use]
    pub fn as_slice(&self) -> &[StepName] {
        &self.steps
    }

    /// Whether the list contains no steps; the runner skips all startup health
    /// probes and moves directly to `HEALTHY` in this case.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Reconciles this canonical order against a runtime-provided step name set,
    /// per the Pipeline Runner's ordering contract:
    ///
    /// - if the runtime set exactly matches the canonical order (as a set), the
    ///   canonical order is used;
    /// - if the runtime set contains names absent from the canonical order, the
    ///   caller's order is preserved and the absent names are reported as warnings;
    /// - names present in the canonical order but absent from the runtime set are
    ///   reported as warnings and dropped.
    #[must_use]
    pub fn reconcile(&self, runtime_steps: &[StepName]) -> ReconciledOrder {
        let canonical_has_extra: Vec<StepName> = self
            .steps
            .iter()
            .filter(|s| !runtime_steps.contains(s))
            .cloned()
            .collect();
        let runtime_has_extra: Vec<StepName> = runtime_steps
            .iter()
            .filter(|s| !self.steps.contains(s))
            .cloned()
            .collect();

        let order = if runtime_has_extra.is_empty() {
            self.steps
                .iter()
                .filter(|s| runtime_steps.contains(s))
                .cloned()
                .collect()
        } else {
            runtime_steps.to_vec()
        };

        ReconciledOrder {
            order,
            ignored_from_canonical: canonical_has_extra,
            unknown_in_runtime: runtime_has_extra,
        }
    }
}

/// The result of reconciling a canonical [`OrderedStepList`] with a runtime-provided
/// step set, per Open Question 1 (resolved: caller order is preserved with a warning
/// when the runtime set contains unknown steps; see `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledOrder {
    /// The order the runner should apply.
    pub order: Vec<StepName>,
    /// Canonical step names absent from the runtime set; ignored with a warning.
    pub ignored_from_canonical: Vec<StepName>,
    /// Runtime step names absent from the canonical order; caller order is
    /// preserved and these are reported with a warning.
    pub unknown_in_runtime: Vec<StepName>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_reports_empty() {
        assert!(OrderedStepList::default().is_empty());
    }

    #[test]
    fn reconcile_uses_canonical_order_when_sets_match() {
        let canonical = OrderedStepList::new(vec!["B".into(), "A".into()]);
        let result = canonical.reconcile(&["A".into(), "B".into()]);
        assert_eq!(result.order, vec![StepName::from("B"), StepName::from("A")]);
        assert!(result.unknown_in_runtime.is_empty());
        assert!(result.ignored_from_canonical.is_empty());
    }

    #[test]
    fn reconcile_preserves_caller_order_with_unknown_runtime_step() {
        let canonical = OrderedStepList::new(vec!["A".into(), "B".into()]);
        let result = canonical.reconcile(&["B".into(), "A".into(), "C".into()]);
        assert_eq!(
            result.order,
            vec![StepName::from("B"), StepName::from("A"), StepName::from("C")]
        );
        assert_eq!(result.unknown_in_runtime, vec![StepName::from("C")]);
    }

    #[test]
    fn reconcile_drops_canonical_steps_absent_from_runtime() {
        let canonical = OrderedStepList::new(vec!["A".into(), "B".into()]);
        let result = canonical.reconcile(&["A".into()]);
        assert_eq!(result.order, vec![StepName::from("A")]);
        assert_eq!(result.ignored_from_canonical, vec![StepName::from("B")]);
    }
}
