// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised while compiling a pipeline template into rendered artifacts.
//!
//! Per the failure policy across phases (§4.1): any validation failure halts the
//! compilation round and surfaces diagnostics; no partial output is written. Each
//! phase returns its own variant(s) so a caller can tell which phase failed without
//! string-matching the message.

use miette::Diagnostic;
use tpf_ir::StepName;

/// All errors that can occur while compiling a pipeline template.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum CompileError {
    /// Discovery failed to load or validate the pipeline template.
    #[error("discovery failed: {0}")]
    #[diagnostic(code(tpf_compiler::discovery_failed), url(docsrs))]
    Discovery(#[from] tpf_ir::error::Error),

    /// Discovery found a template step with no matching entry in the link-time
    /// step registry.
    #[error("step `{step}` is declared in the pipeline template but no `#[tpf_macros::pipeline_step]` registered an implementation for it")]
    #[diagnostic(code(tpf_compiler::missing_step_impl), url(docsrs))]
    MissingStepImpl {
        /// The declared-but-unregistered step name.
        step: StepName,
    },

    /// Semantic analysis rejected an illegal combination of parallelism hints.
    #[error("step `{step}` declares thread_safety=UNSAFE or ordering=STRICT_REQUIRED, which cannot be combined with a streaming shape implying per-item concurrency ({shape:?})")]
    #[diagnostic(code(tpf_compiler::illegal_concurrency_combination), url(docsrs))]
    IllegalConcurrencyCombination {
        /// The offending step.
        step: StepName,
        /// The streaming shape the step was resolved to.
        shape: tpf_ir::step_model::StreamingShape,
    },

    /// Target resolution or binding construction produced an IR model that
    /// violates one of `StepModel`'s own invariants.
    #[error("failed to construct the IR model for step `{step}`: {source}")]
    #[diagnostic(code(tpf_compiler::model_construction_failed), url(docsrs))]
    ModelConstruction {
        /// The step whose model could not be constructed.
        step: StepName,
        /// The underlying IR invariant violation.
        #[source]
        source: tpf_ir::error::Error,
    },

    /// A binding referenced a step, aspect, or module that Discovery never produced.
    #[error("binding construction referenced unknown step `{step}`")]
    #[diagnostic(code(tpf_compiler::unknown_step_reference), url(docsrs))]
    UnknownStepReference {
        /// The unresolvable step name.
        step: StepName,
    },

    /// A renderer failed to produce an artifact for a binding.
    #[error("renderer for target {target:?} failed for step `{step}`: {details}")]
    #[diagnostic(code(tpf_compiler::render_failed), url(docsrs))]
    RenderFailed {
        /// The generation target whose renderer failed.
        target: tpf_ir::step_model::GenerationTarget,
        /// The step being rendered.
        step: StepName,
        /// A human-readable description of the failure.
        details: String,
    },

    /// Order emission could not serialize the ordered-step resource.
    #[error("failed to emit the ordered-step resource: {details}")]
    #[diagnostic(code(tpf_compiler::order_emission_failed), url(docsrs))]
    OrderEmissionFailed {
        /// A human-readable description of the failure.
        details: String,
    },

    /// Several independent validation failures accumulated within a single phase;
    /// the round halts with none of them silently dropped.
    #[error("{} validation error(s) in phase `{phase}`", errors.len())]
    #[diagnostic(code(tpf_compiler::phase_failed), url(docsrs))]
    PhaseFailed {
        /// The phase that accumulated the errors (e.g. `"semantic_analysis"`).
        phase: &'static str,
        /// The accumulated errors, in detection order.
        #[related]
        errors: Vec<CompileError>,
    },
}
