// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The immutable IR description of a single step.

use crate::error::Error;
use crate::{Context, PackageName, StepName};
use serde::{Deserialize, Serialize};

/// The user-declared shape of a step, as written in the pipeline template.
///
/// Maps to a [`StreamingShape`] during semantic analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    /// One input produces one output.
    OneToOne,
    /// One input produces many outputs (fan-out).
    Expansion,
    /// Many inputs reduce to one output.
    Reduction,
    /// A step that passes its input through unchanged but performs a side effect.
    SideEffect,
    /// Many inputs map to many outputs with no fixed ratio.
    ManyToMany,
}

impl Cardinality {
    /// Maps a user-declared cardinality to the streaming shape consumed by the runner.
    ///
    /// `ManyToMany` maps to `StreamInStreamOut` because it carries no multiplicity
    /// guarantee the adaptation rules in the runner could otherwise rely on.
    #[must_use]
    pub const fn to_streaming_shape(self) -> StreamingShape {
        match self {
            Cardinality::OneToOne => StreamingShape::UnaryInUnaryOut,
            Cardinality::Expansion => StreamingShape::UnaryInStreamOut,
            Cardinality::Reduction => StreamingShape::StreamInUnaryOut,
            Cardinality::SideEffect => StreamingShape::SideEffect,
            Cardinality::ManyToMany => StreamingShape::StreamInStreamOut,
        }
    }
}

/// The streaming cardinality of a step's interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingShape {
    /// A deferred single input yields a deferred single output.
    UnaryInUnaryOut,
    /// A deferred single input yields a lazy sequence.
    UnaryInStreamOut,
    /// A lazy sequence reduces to a deferred single output.
    StreamInUnaryOut,
    /// A lazy sequence yields a lazy sequence.
    StreamInStreamOut,
    /// Input and output domain types are identical; the step is run for effect only.
    SideEffect,
}

impl StreamingShape {
    /// Whether this shape is a legal auto-parallelism candidate under `resolveParallel`
    /// rule 6: only unary-in/stream-out shapes default to parallel under `AUTO`.
    #[must_use]
    pub const fn is_auto_parallel_candidate(self) -> bool {
        matches!(self, StreamingShape::UnaryInStreamOut)
    }
}

/// How a step's `apply` operation is invoked by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    /// Runs inline on the reactive scheduler; must not block.
    Reactive,
    /// Returns a future that the runner awaits.
    Future,
    /// Blocks the calling thread; the runner offloads it to a blocking-capable scheduler.
    Blocking,
}

/// A generation target a step may be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationTarget {
    /// gRPC server-side handler.
    GrpcServer,
    /// gRPC client stub, used from an orchestrator role.
    GrpcClient,
    /// REST server-side handler.
    RestServer,
    /// REST client stub.
    RestClient,
    /// Plugin host server-side handler.
    PluginServer,
    /// Plugin client stub.
    PluginClient,
    /// Orchestrator entry-point wiring.
    Orchestrator,
}

/// The deployment bucket a step's rendered artifact is packaged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentRole {
    /// The step runs inside the pipeline server process.
    PipelineServer,
    /// The step is invoked by the orchestrator as a client.
    OrchestratorClient,
    /// The step hosts a plugin implementation.
    PluginServer,
    /// The step invokes a plugin implementation.
    PluginClient,
    /// The step is exposed directly over REST.
    RestServer,
}

impl DeploymentRole {
    /// The generation targets that can emit this deployment role.
    #[must_use]
    pub const fn compatible_targets(self) -> &'static [GenerationTarget] {
        match self {
            DeploymentRole::PipelineServer => {
                &[GenerationTarget::GrpcServer, GenerationTarget::RestServer]
            }
            DeploymentRole::OrchestratorClient => {
                &[GenerationTarget::GrpcClient, GenerationTarget::Orchestrator]
            }
            DeploymentRole::PluginServer => &[GenerationTarget::PluginServer],
            DeploymentRole::PluginClient => &[GenerationTarget::PluginClient],
            DeploymentRole::RestServer => &[GenerationTarget::RestServer],
        }
    }
}

/// Ordering guarantee a step expects from the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ordering {
    /// The runner must run this step sequentially; any other policy is a configuration error.
    StrictRequired,
    /// The runner should prefer sequential but may be overridden to parallel explicitly.
    StrictAdvised,
    /// No ordering requirement; the runner is free to choose.
    Relaxed,
}

/// Thread-safety declared by a step implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadSafety {
    /// May be invoked concurrently from multiple tasks.
    Safe,
    /// Must be invoked from at most one task at a time.
    Unsafe,
}

/// Parallelism hints a step may declare; default is `(Relaxed, Safe)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParallelismHints {
    /// The ordering guarantee this step expects.
    pub ordering: Ordering,
    /// The thread-safety of the step's `apply` implementation.
    pub thread_safety: ThreadSafety,
}

impl Default for ParallelismHints {
    fn default() -> Self {
        Self {
            ordering: Ordering::Relaxed,
            thread_safety: ThreadSafety::Safe,
        }
    }
}

/// A domain type together with an optional mapper used when the wire type differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMapping {
    /// The type as seen by user step code.
    pub domain_type: StepName,
    /// The type as seen on the wire, if it differs from `domain_type`.
    pub wire_type: Option<StepName>,
    /// The mapper type converting between `domain_type` and `wire_type`, present
    /// iff `wire_type.is_some()`.
    pub mapper_type: Option<StepName>,
}

impl TypeMapping {
    /// A mapping where the domain and wire types are identical; no mapper is required.
    #[must_use]
    pub fn identity(domain_type: StepName) -> Self {
        Self {
            domain_type,
            wire_type: None,
            mapper_type: None,
        }
    }

    /// Whether this mapping requires a generated mapper (wire type differs from domain type).
    #[must_use]
    pub fn requires_mapper(&self) -> bool {
        self.wire_type.is_some()
    }
}

/// The fully-qualified identity of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// The package/module the step belongs to.
    pub package: PackageName,
    /// The user-facing logical name.
    pub logical_name: StepName,
    /// The canonical, fully-qualified class/type name.
    pub canonical_name: StepName,
}

/// Immutable intermediate-representation description of a single step.
///
/// Construction is validated; see [`StepModel::new`] for the invariants enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepModel {
    service_identity: ServiceIdentity,
    streaming_shape: StreamingShape,
    input_mapping: TypeMapping,
    output_mapping: TypeMapping,
    execution_mode: ExecutionMode,
    enabled_targets: Vec<GenerationTarget>,
    deployment_role: DeploymentRole,
    parallelism_hints: ParallelismHints,
}

impl StepModel {
    /// Builds a new `StepModel`, enforcing the invariants from the data model:
    ///
    /// - `deployment_role` must be reachable from at least one of `enabled_targets`.
    /// - a mapper is present on a [`TypeMapping`] iff its wire type differs from its domain type.
    /// - `SIDE_EFFECT` steps must have identical input/output domain types.
    pub fn new(
        service_identity: ServiceIdentity,
        streaming_shape: StreamingShape,
        input_mapping: TypeMapping,
        output_mapping: TypeMapping,
        execution_mode: ExecutionMode,
        enabled_targets: Vec<GenerationTarget>,
        deployment_role: DeploymentRole,
        parallelism_hints: ParallelismHints,
    ) -> Result<Self, Error> {
        let step = service_identity.canonical_name.clone();

        if !deployment_role
            .compatible_targets()
            .iter()
            .any(|t| enabled_targets.contains(t))
        {
            return Err(Error::UnreachableDeploymentRole {
                step,
                role: deployment_role,
                targets: enabled_targets,
            });
        }

        for mapping in [&input_mapping, &output_mapping] {
            let mapper_matches_wire = mapping.mapper_type.is_some() == mapping.requires_mapper();
            if !mapper_matches_wire {
                return Err(Error::InvariantViolation {
                    step,
                    details: "mapper_type must be present iff wire_type differs from domain_type"
                        .to_string(),
                });
            }
        }

        if matches!(streaming_shape, StreamingShape::SideEffect)
            && input_mapping.domain_type != output_mapping.domain_type
        {
            return Err(Error::InvariantViolation {
                step,
                details: "SIDE_EFFECT steps must have identical input/output domain types"
                    .to_string(),
            });
        }

        Ok(Self {
            service_identity,
            streaming_shape,
            input_mapping,
            output_mapping,
            execution_mode,
            enabled_targets,
            deployment_role,
            parallelism_hints,
        })
    }

    /// The step's fully-qualified identity.
    #[must_use]
    pub fn service_identity(&self) -> &ServiceIdentity {
        &self.service_identity
    }

    /// The streaming shape this step was resolved to.
    #[must_use]
    pub fn streaming_shape(&self) -> StreamingShape {
        self.streaming_shape
    }

    /// The step's input type mapping.
    #[must_use]
    pub fn input_mapping(&self) -> &TypeMapping {
        &self.input_mapping
    }

    /// The step's output type mapping.
    #[must_use]
    pub fn output_mapping(&self) -> &TypeMapping {
        &self.output_mapping
    }

    /// How the step's `apply` operation is invoked.
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    /// The generation targets enabled for this step.
    #[must_use]
    pub fn enabled_targets(&self) -> &[GenerationTarget] {
        &self.enabled_targets
    }

    /// The deployment role this step's rendered artifact is packaged into.
    #[must_use]
    pub fn deployment_role(&self) -> DeploymentRole {
        self.deployment_role
    }

    /// The step's declared parallelism hints.
    #[must_use]
    pub fn parallelism_hints(&self) -> ParallelismHints {
        self.parallelism_hints
    }

    /// A synthetic `SIDE_EFFECT` step inserted by aspect expansion, reusing the preceding
    /// step's stream-element type as both input and output (see binding construction).
    #[must_use]
    pub fn synthetic_side_effect(
        name: StepName,
        package: PackageName,
        element_type: StepName,
        deployment_role: DeploymentRole,
        enabled_targets: Vec<GenerationTarget>,
    ) -> Result<Self, Error> {
        Self::new(
            ServiceIdentity {
                package,
                logical_name: name.clone(),
                canonical_name: name,
            },
            StreamingShape::SideEffect,
            TypeMapping::identity(element_type.clone()),
            TypeMapping::identity(element_type),
            ExecutionMode::Reactive,
            enabled_targets,
            deployment_role,
            ParallelismHints::default(),
        )
    }

    /// Builds the diagnostic [`Context`] naming this step, for use by callers reporting
    /// errors that reference it.
    #[must_use]
    pub fn context(&self, phase: &'static str) -> Context {
        Context {
            step: Some(self.service_identity.canonical_name.clone()),
            phase: Some(phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &'static str) -> ServiceIdentity {
        ServiceIdentity {
            package: "com.example".into(),
            logical_name: name.into(),
            canonical_name: format!("com.example.{name}").into(),
        }
    }

    #[test]
    fn cardinality_maps_to_expected_shape() {
        assert_eq!(
            Cardinality::OneToOne.to_streaming_shape(),
            StreamingShape::UnaryInUnaryOut
        );
        assert_eq!(
            Cardinality::Expansion.to_streaming_shape(),
            StreamingShape::UnaryInStreamOut
        );
        assert_eq!(
            Cardinality::Reduction.to_streaming_shape(),
            StreamingShape::StreamInUnaryOut
        );
        assert_eq!(
            Cardinality::SideEffect.to_streaming_shape(),
            StreamingShape::SideEffect
        );
        assert_eq!(
            Cardinality::ManyToMany.to_streaming_shape(),
            StreamingShape::StreamInStreamOut
        );
    }

    #[test]
    fn rejects_unreachable_deployment_role() {
        let result = StepModel::new(
            identity("PriceStep"),
            StreamingShape::UnaryInUnaryOut,
            TypeMapping::identity("Order".into()),
            TypeMapping::identity("Order".into()),
            ExecutionMode::Reactive,
            vec![GenerationTarget::PluginServer],
            DeploymentRole::PipelineServer,
            ParallelismHints::default(),
        );
        assert!(matches!(
            result,
            Err(Error::UnreachableDeploymentRole { .. })
        ));
    }

    #[test]
    fn accepts_compatible_deployment_role() {
        let model = StepModel::new(
            identity("PriceStep"),
            StreamingShape::UnaryInUnaryOut,
            TypeMapping::identity("Order".into()),
            TypeMapping::identity("Order".into()),
            ExecutionMode::Reactive,
            vec![GenerationTarget::GrpcServer, GenerationTarget::GrpcClient],
            DeploymentRole::PipelineServer,
            ParallelismHints::default(),
        )
        .expect("deployment role is reachable from enabled targets");
        assert_eq!(model.deployment_role(), DeploymentRole::PipelineServer);
    }

    #[test]
    fn rejects_mapper_without_wire_type_mismatch() {
        let mismatched = TypeMapping {
            domain_type: "Order".into(),
            wire_type: None,
            mapper_type: Some("OrderMapper".into()),
        };
        let result = StepModel::new(
            identity("PriceStep"),
            StreamingShape::UnaryInUnaryOut,
            mismatched,
            TypeMapping::identity("Order".into()),
            ExecutionMode::Reactive,
            vec![GenerationTarget::GrpcServer],
            DeploymentRole::PipelineServer,
            ParallelismHints::default(),
        );
        assert!(matches!(result, Err(Error::InvariantViolation { .. })));
    }

    #[test]
    fn rejects_side_effect_with_differing_domain_types() {
        let result = StepModel::new(
            identity("LogStep"),
            StreamingShape::SideEffect,
            TypeMapping::identity("Order".into()),
            TypeMapping::identity("Receipt".into()),
            ExecutionMode::Reactive,
            vec![GenerationTarget::GrpcServer],
            DeploymentRole::PipelineServer,
            ParallelismHints::default(),
        );
        assert!(matches!(result, Err(Error::InvariantViolation { .. })));
    }

    #[test]
    fn synthetic_side_effect_reuses_element_type() {
        let model = StepModel::synthetic_side_effect(
            "com.example.CacheWriteAspect".into(),
            "com.example".into(),
            "Order".into(),
            DeploymentRole::PipelineServer,
            vec![GenerationTarget::GrpcServer],
        )
        .expect("synthetic side-effect steps satisfy their own invariants");
        assert_eq!(model.input_mapping().domain_type, model.output_mapping().domain_type);
        assert_eq!(model.streaming_shape(), StreamingShape::SideEffect);
    }

    #[test]
    fn auto_parallel_candidate_is_only_unary_in_stream_out() {
        assert!(StreamingShape::UnaryInStreamOut.is_auto_parallel_candidate());
        assert!(!StreamingShape::UnaryInUnaryOut.is_auto_parallel_candidate());
        assert!(!StreamingShape::StreamInStreamOut.is_auto_parallel_candidate());
    }
}
