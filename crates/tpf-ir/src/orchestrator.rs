// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The declared pipeline entry point.

use crate::StepName;
use serde::{Deserialize, Serialize};

/// Declares the pipeline's entry point: the first step's input type, whether a
/// CLI wrapper should be generated, and the downstream modules it dispatches into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorModel {
    /// The type accepted by the pipeline's first step.
    pub entry_input_type: StepName,
    /// Whether a generated CLI entry point is required, either from an explicit
    /// declaration or the global CLI flag (see semantic analysis).
    pub generate_cli: bool,
    /// The downstream modules the orchestrator dispatches into, in pipeline order.
    pub downstream_modules: Vec<StepName>,
}

impl OrchestratorModel {
    /// Whether an orchestrator artifact must be generated: true if there is an
    /// explicit declaration and either a CLI is requested or there are downstream
    /// modules to wire.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.generate_cli || !self.downstream_modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_when_cli_requested_with_no_modules() {
        let model = OrchestratorModel {
            entry_input_type: "Order".into(),
            generate_cli: true,
            downstream_modules: vec![],
        };
        assert!(model.is_required());
    }

    #[test]
    fn not_required_without_cli_or_modules() {
        let model = OrchestratorModel {
            entry_input_type: "Order".into(),
            generate_cli: false,
            downstream_modules: vec![],
        };
        assert!(!model.is_required());
    }
}
