// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Semantic Analysis (§4.1.2): maps declared cardinalities to streaming shapes,
//! rejects illegal parallelism-hint combinations, and decides which aspects must
//! expand into synthetic side-effect steps.

use crate::discovery::DiscoveryOutput;
use crate::error::CompileError;
use tpf_ir::aspect::AspectModel;
use tpf_ir::step_model::{Ordering, StreamingShape, ThreadSafety};
use tpf_ir::template::StepDeclaration;
use tpf_ir::StepName;

/// A step's resolved shape and parallelism hints, ready for target resolution.
#[derive(Debug, Clone)]
pub struct AnalyzedStep {
    /// The original declaration, retained for downstream phases.
    pub declaration: StepDeclaration,
    /// The resolved streaming shape.
    pub streaming_shape: StreamingShape,
}

/// Semantic analysis's output: resolved steps plus the aspects that require
/// expansion into synthetic side-effect steps, paired with the step(s) they attach to.
#[derive(Debug, Clone)]
pub struct SemanticOutput {
    /// Every declared step, resolved to a streaming shape.
    pub steps: Vec<AnalyzedStep>,
    /// Aspects requiring expansion, in declared order.
    pub expandable_aspects: Vec<AspectModel>,
    /// Whether an orchestrator entry point must be generated.
    pub needs_orchestrator: bool,
}

/// Runs semantic analysis against Discovery's output.
///
/// Rejects a step whose declared `thread_safety` is `UNSAFE` or `ordering` is
/// `STRICT_REQUIRED` when its resolved shape implies per-item concurrency
/// (`UNARY_IN_STREAM_OUT`, the only auto-parallel candidate shape, or any step
/// explicitly requesting `parallel: true`) — such a combination can never be
/// satisfied by the runner's `resolveParallel` policy. All violations accumulate
/// into a single [`CompileError::PhaseFailed`].
pub fn analyze(discovery: DiscoveryOutput) -> Result<SemanticOutput, CompileError> {
    let mut errors = Vec::new();
    let mut steps = Vec::with_capacity(discovery.template.steps.len());

    for declaration in &discovery.template.steps {
        let shape = declaration.cardinality.to_streaming_shape();
        let hints = declaration.parallelism_hints();
        let wants_concurrency =
            shape.is_auto_parallel_candidate() || declaration.parallel == Some(true);

        let forbids_concurrency = hints.thread_safety == ThreadSafety::Unsafe
            || hints.ordering == Ordering::StrictRequired;

        if wants_concurrency && forbids_concurrency {
            errors.push(CompileError::IllegalConcurrencyCombination {
                step: declaration.name.clone(),
                shape,
            });
            continue;
        }

        steps.push(AnalyzedStep {
            declaration: declaration.clone(),
            streaming_shape: shape,
        });
    }

    if !errors.is_empty() {
        return Err(CompileError::PhaseFailed {
            phase: "semantic_analysis",
            errors,
        });
    }

    let expandable_aspects: Vec<AspectModel> = discovery
        .aspects
        .iter()
        .filter(|a| a.requires_expansion())
        .cloned()
        .collect();

    let needs_orchestrator = discovery
        .template
        .orchestrator
        .as_ref()
        .is_some_and(|o| o.generate_cli)
        || discovery.template.orchestrator.is_some();

    Ok(SemanticOutput {
        steps,
        expandable_aspects,
        needs_orchestrator,
    })
}

/// Names of every step an aspect's scope applies to, given the full resolved step list.
#[must_use]
pub fn steps_covered_by<'a>(
    aspect: &'a AspectModel,
    steps: &'a [AnalyzedStep],
) -> Vec<&'a StepName> {
    steps
        .iter()
        .map(|s| &s.declaration.name)
        .filter(|name| aspect.applies_to(name.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tpf_ir::step_model::Cardinality;
    use tpf_ir::template::PipelineTemplate;
    use tpf_ir::Transport;

    fn declaration(cardinality: Cardinality, ordering: Option<Ordering>, thread_safety: Option<ThreadSafety>, parallel: Option<bool>) -> StepDeclaration {
        StepDeclaration {
            name: "com.example.PriceStep".into(),
            cardinality,
            input_type_name: "Order".to_string(),
            input_fields: vec![],
            output_type_name: "Order".to_string(),
            output_fields: vec![],
            parallel,
            ordering,
            thread_safety,
            kind: tpf_ir::template::StepKind::Ordinary,
        }
    }

    fn discovery_output(steps: Vec<StepDeclaration>) -> DiscoveryOutput {
        DiscoveryOutput {
            template: PipelineTemplate {
                app_name: "orders".to_string(),
                base_package: "com.example".to_string(),
                transport: Transport::Grpc,
                steps,
                aspects: BTreeMap::new(),
                orchestrator: None,
            },
            aspects: vec![],
        }
    }

    #[test]
    fn resolves_cardinality_to_shape() {
        let out = analyze(discovery_output(vec![declaration(
            Cardinality::OneToOne,
            None,
            None,
            None,
        )]))
        .expect("no conflict");
        assert_eq!(out.steps[0].streaming_shape, StreamingShape::UnaryInUnaryOut);
    }

    #[test]
    fn rejects_unsafe_thread_safety_on_auto_parallel_candidate() {
        let result = analyze(discovery_output(vec![declaration(
            Cardinality::Expansion,
            None,
            Some(ThreadSafety::Unsafe),
            None,
        )]));
        match result {
            Err(CompileError::PhaseFailed { phase, errors }) => {
                assert_eq!(phase, "semantic_analysis");
                assert!(matches!(
                    errors[0],
                    CompileError::IllegalConcurrencyCombination { .. }
                ));
            }
            other => panic!("expected PhaseFailed, got {other:?}"),
        }
    }

    #[test]
    fn rejects_strict_required_ordering_with_explicit_parallel_flag() {
        let result = analyze(discovery_output(vec![declaration(
            Cardinality::OneToOne,
            Some(Ordering::StrictRequired),
            None,
            Some(true),
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn allows_unsafe_thread_safety_on_non_concurrent_shape() {
        let result = analyze(discovery_output(vec![declaration(
            Cardinality::OneToOne,
            None,
            Some(ThreadSafety::Unsafe),
            None,
        )]));
        assert!(result.is_ok());
    }
}
