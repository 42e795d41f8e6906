// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Discovery (§4.1.1): the compiler's first phase.
//!
//! Since this is a from-scratch Rust reimplementation with no annotation-processing
//! compiler plugin host, Discovery's "source roots" input is realized as the pipeline
//! template file plus the link-time step registry populated by
//! `#[tpf_macros::pipeline_step]` (via [`tpf_runtime::registry::STEP_REGISTRY`]), which
//! stands in for scanning annotated source for step declarations.

use crate::error::CompileError;
use std::collections::BTreeSet;
use tpf_ir::aspect::AspectModel;
use tpf_ir::error::Error as IrError;
use tpf_ir::template::PipelineTemplate;
use tpf_ir::Transport;

/// Everything Discovery extracts from the pipeline template, validated and ready
/// for Semantic Analysis.
#[derive(Debug, Clone)]
pub struct DiscoveryOutput {
    /// The validated pipeline template.
    pub template: PipelineTemplate,
    /// Declared aspects, converted from the template's raw `aspects` map.
    pub aspects: Vec<AspectModel>,
}

/// Runs Discovery against an already-parsed `template`, cross-referencing its
/// declared step names against `registered_steps` (typically
/// `tpf_runtime::registry::step_descriptor_map().keys()`).
///
/// Failure: a missing required field or an unrecognized transport is reported by
/// [`PipelineTemplate::validate`] (surfaced here as [`CompileError::Discovery`]); a
/// declared step with no registered implementation is reported as
/// [`CompileError::MissingStepImpl`]. All failures are accumulated and returned
/// together as a single [`CompileError::PhaseFailed`] — no partial output.
pub fn discover(
    template: PipelineTemplate,
    registered_steps: &BTreeSet<String>,
) -> Result<DiscoveryOutput, CompileError> {
    let mut errors = Vec::new();

    match template.validate() {
        Ok(()) => {}
        Err(IrError::InvalidTemplate { errors: field_errors }) => {
            errors.extend(field_errors.into_iter().map(CompileError::Discovery));
        }
        Err(other) => errors.push(CompileError::Discovery(other)),
    }

    for step in &template.steps {
        if !registered_steps.contains(step.name.as_ref()) {
            errors.push(CompileError::MissingStepImpl {
                step: step.name.clone(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(CompileError::PhaseFailed {
            phase: "discovery",
            errors,
        });
    }

    let aspects = template
        .aspects
        .iter()
        .map(|(name, declaration)| declaration.clone().into_model(name.clone().into()))
        .collect();

    Ok(DiscoveryOutput { template, aspects })
}

/// The subset of a [`DiscoveryOutput`] Target Resolution needs: the global
/// transport selection every ordinary step is resolved against.
#[must_use]
pub fn transport_of(discovery: &DiscoveryOutput) -> Transport {
    discovery.template.transport
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpf_ir::template::StepDeclaration;

    fn step(name: &str) -> StepDeclaration {
        StepDeclaration {
            name: name.to_string().into(),
            cardinality: tpf_ir::step_model::Cardinality::OneToOne,
            input_type_name: "Order".to_string(),
            input_fields: vec![],
            output_type_name: "Order".to_string(),
            output_fields: vec![],
            parallel: None,
            ordering: None,
            thread_safety: None,
            kind: tpf_ir::template::StepKind::Ordinary,
        }
    }

    fn template(steps: Vec<StepDeclaration>) -> PipelineTemplate {
        PipelineTemplate {
            app_name: "orders".to_string(),
            base_package: "com.example.orders".to_string(),
            transport: Transport::Grpc,
            steps,
            aspects: Default::default(),
            orchestrator: None,
        }
    }

    #[test]
    fn discovers_registered_steps_cleanly() {
        let registered = BTreeSet::from(["com.example.orders.PriceStep".to_string()]);
        let result = discover(template(vec![step("com.example.orders.PriceStep")]), &registered);
        assert!(result.is_ok());
    }

    #[test]
    fn reports_missing_step_implementation() {
        let registered = BTreeSet::new();
        let result = discover(template(vec![step("com.example.orders.PriceStep")]), &registered);
        match result {
            Err(CompileError::PhaseFailed { phase, errors }) => {
                assert_eq!(phase, "discovery");
                assert!(matches!(errors[0], CompileError::MissingStepImpl { .. }));
            }
            other => panic!("expected PhaseFailed, got {other:?}"),
        }
    }
}
