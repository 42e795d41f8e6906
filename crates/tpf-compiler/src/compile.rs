// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The single compilation entry point chaining all six phases in strict order.

use crate::binding::{self, BoundPipeline};
use crate::discovery;
use crate::error::CompileError;
use crate::order_emission;
use crate::render::{self, Artifact};
use crate::semantic;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tpf_ir::template::PipelineTemplate;
use tracing::info;

/// Input to a single compilation round.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// The parsed pipeline template.
    pub template: PipelineTemplate,
    /// Canonical names of steps with a registered implementation (typically
    /// `tpf_runtime::registry::step_descriptor_map().keys()`).
    pub registered_steps: BTreeSet<String>,
}

/// Output of a successful compilation round.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Every rendered artifact, grouped by role via [`Artifact::role`].
    pub artifacts: Vec<Artifact>,
    /// The serialized `order.json` contents.
    pub order_json: String,
    /// The canonical step order, for callers that want it without reparsing JSON.
    pub ordered_steps: Vec<tpf_ir::StepName>,
}

/// Compiles a pipeline template into rendered artifacts and the ordered-step resource.
///
/// Runs Discovery → Semantic Analysis → Target Resolution → Binding Construction
/// → Rendering → Order Emission strictly in order within one round; the first
/// phase that reports failures halts compilation with no partial output.
pub fn compile(input: CompileInput) -> Result<CompileOutput, CompileError> {
    info!(app = %input.template.app_name, "starting compilation round");

    let transport = input.template.transport;
    let base_package = input.template.base_package.clone();

    let discovered = discovery::discover(input.template, &input.registered_steps)?;
    info!(steps = discovered.template.steps.len(), "discovery complete");

    let analyzed = semantic::analyze(discovered)?;
    info!(
        expandable_aspects = analyzed.expandable_aspects.len(),
        needs_orchestrator = analyzed.needs_orchestrator,
        "semantic analysis complete"
    );

    let BoundPipeline {
        bindings,
        ordered_steps,
    } = binding::construct(analyzed, transport, &base_package)?;
    info!(bindings = bindings.len(), "binding construction complete");

    let artifacts = render::render_all(&bindings)?;
    info!(artifacts = artifacts.len(), "rendering complete");

    let order_json = order_emission::emit(&ordered_steps)?;
    info!("order emission complete");

    Ok(CompileOutput {
        artifacts,
        order_json,
        ordered_steps,
    })
}

/// Where a [`CompileOutput`]'s artifacts should be written, keyed by role source root.
#[must_use]
pub fn output_root(base: &std::path::Path, role: render::Role) -> PathBuf {
    base.join(role.source_root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tpf_ir::step_model::Cardinality;
    use tpf_ir::template::{StepDeclaration, StepKind};
    use tpf_ir::Transport;

    fn minimal_template() -> PipelineTemplate {
        PipelineTemplate {
            app_name: "orders".to_string(),
            base_package: "com.example.orders".to_string(),
            transport: Transport::Grpc,
            steps: vec![StepDeclaration {
                name: "PriceStep".to_string().into(),
                cardinality: Cardinality::OneToOne,
                input_type_name: "Order".to_string(),
                input_fields: vec![],
                output_type_name: "Order".to_string(),
                output_fields: vec![],
                parallel: None,
                ordering: None,
                thread_safety: None,
                kind: StepKind::Ordinary,
            }],
            aspects: BTreeMap::new(),
            orchestrator: None,
        }
    }

    #[test]
    fn compiles_minimal_template_end_to_end() {
        let output = compile(CompileInput {
            template: minimal_template(),
            registered_steps: BTreeSet::from(["PriceStep".to_string()]),
        })
        .expect("compilation succeeds");
        assert_eq!(output.ordered_steps.len(), 1);
        assert!(!output.artifacts.is_empty());
        assert!(output.order_json.contains("com.example.orders.PriceStep"));
    }

    #[test]
    fn halts_with_no_partial_output_on_missing_step_impl() {
        let result = compile(CompileInput {
            template: minimal_template(),
            registered_steps: BTreeSet::new(),
        });
        assert!(matches!(
            result,
            Err(CompileError::PhaseFailed { phase: "discovery", .. })
        ));
    }
}
