// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised while building or validating the intermediate representation.

use crate::{Context, StepName};
use miette::Diagnostic;

/// Errors that can occur while constructing, validating or loading IR data.
///
/// Note: all errors are contextualized with the compiler phase and step name, where
/// applicable, via [`Context`].
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A collection of errors accumulated while validating a single template.
    #[error("invalid pipeline template: {errors:?}")]
    #[diagnostic(code(tpf_ir::invalid_template), url(docsrs))]
    InvalidTemplate {
        /// The errors collected during validation, in declaration order.
        #[related]
        errors: Vec<Error>,
    },

    /// The template file could not be read from disk.
    #[error("failed to read template file `{path}`: {details}")]
    #[diagnostic(code(tpf_ir::file_read_error), url(docsrs))]
    FileReadError {
        /// The path that could not be read.
        path: String,
        /// The underlying I/O error message.
        details: String,
    },

    /// The template content could not be deserialized.
    #[error("{format} deserialization error: {details}\nContext: {context}")]
    #[diagnostic(code(tpf_ir::deserialization_error), url(docsrs))]
    DeserializationError {
        /// Where in the build this was detected.
        context: Context,
        /// The format being parsed (e.g. "YAML", "JSON").
        format: &'static str,
        /// A description of the error that occurred.
        details: String,
    },

    /// The template's `transport` field did not match a known transport.
    #[error("unknown transport `{value}`\nContext: {context}")]
    #[diagnostic(code(tpf_ir::unknown_transport), url(docsrs))]
    UnknownTransport {
        /// Where in the build this was detected.
        context: Context,
        /// The raw, unrecognized value.
        value: String,
    },

    /// A required template field was absent.
    #[error("missing required field `{field}`\nContext: {context}")]
    #[diagnostic(code(tpf_ir::missing_field), url(docsrs))]
    MissingField {
        /// Where in the build this was detected.
        context: Context,
        /// The name of the absent field.
        field: &'static str,
    },

    /// A step's declared cardinality did not map to a supported streaming shape.
    #[error("unrecognized cardinality `{value}` on step `{step}`")]
    #[diagnostic(code(tpf_ir::unknown_cardinality), url(docsrs))]
    UnknownCardinality {
        /// The step whose cardinality could not be mapped.
        step: StepName,
        /// The raw, unrecognized value.
        value: String,
    },

    /// A `StepModel` was constructed with a combination of fields that violates one
    /// of its invariants (see [`crate::step_model::StepModel`]).
    #[error("step `{step}` violates a model invariant: {details}")]
    #[diagnostic(code(tpf_ir::invariant_violation), url(docsrs))]
    InvariantViolation {
        /// The offending step.
        step: StepName,
        /// A human-readable description of the violated invariant.
        details: String,
    },

    /// Thread-safety and ordering hints were combined with a policy that cannot honor them.
    #[error(
        "step `{step}` declares thread_safety=UNSAFE or ordering=STRICT_REQUIRED which requires a SEQUENTIAL parallelism policy, but the effective policy is {policy:?}"
    )]
    #[diagnostic(code(tpf_ir::unsafe_parallelism_policy), url(docsrs))]
    UnsafeParallelismPolicy {
        /// The offending step.
        step: StepName,
        /// The effective parallelism policy that was rejected.
        policy: crate::pipeline_config::Parallelism,
    },

    /// A step declared a deployment role that its enabled targets cannot emit.
    #[error("step `{step}` declares deployment_role={role:?} which is not among its enabled_targets {targets:?}")]
    #[diagnostic(code(tpf_ir::unreachable_deployment_role), url(docsrs))]
    UnreachableDeploymentRole {
        /// The offending step.
        step: StepName,
        /// The declared deployment role.
        role: crate::step_model::DeploymentRole,
        /// The targets that were actually enabled for this step.
        targets: Vec<crate::step_model::GenerationTarget>,
    },
}
