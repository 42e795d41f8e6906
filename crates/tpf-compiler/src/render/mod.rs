// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Rendering (§4.1.5): a renderer registry mapping generation target → renderer.
//!
//! Renderers never mutate IR or bindings and never call each other; each is
//! responsible for naming, transport wiring, and adapter glue for its one role.
//! Artifacts are returned in memory rather than written to disk directly, so a
//! caller (the codegen CLI) decides the actual filesystem layout under the
//! role-specific output root (§6).

mod grpc_client;
mod grpc_server;
mod orchestrator;
mod plugin_client;
mod plugin_server;
mod rest_server;

use crate::error::CompileError;
use tpf_ir::binding::Binding;
use tpf_ir::step_model::GenerationTarget;
use tpf_ir::StepName;

/// The deployment bucket an artifact belongs to; mirrors [`tpf_ir::step_model::DeploymentRole`]
/// but names the source root a renderer writes into (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// `…/orchestrator-client`.
    OrchestratorClient,
    /// `…/pipeline-server`.
    PipelineServer,
    /// `…/plugin-client`.
    PluginClient,
    /// `…/plugin-server`.
    PluginServer,
    /// `…/rest-server`.
    RestServer,
}

impl Role {
    /// The source-root directory name this role writes artifacts under.
    #[must_use]
    pub const fn source_root(self) -> &'static str {
        match self {
            Role::OrchestratorClient => "orchestrator-client",
            Role::PipelineServer => "pipeline-server",
            Role::PluginClient => "plugin-client",
            Role::PluginServer => "plugin-server",
            Role::RestServer => "rest-server",
        }
    }
}

/// A single rendered source artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The deployment role this artifact is packaged under.
    pub role: Role,
    /// The step the artifact was rendered for.
    pub step: StepName,
    /// The artifact's path, relative to its role's source root.
    pub relative_path: String,
    /// The generated source contents.
    pub contents: String,
}

/// Renders every `(binding, target)` pair named by each binding's underlying
/// model's `enabled_targets`, dispatching to the per-target renderer.
pub fn render_all(bindings: &[Binding]) -> Result<Vec<Artifact>, CompileError> {
    let mut artifacts = Vec::new();
    let mut errors = Vec::new();

    for binding in bindings {
        for &target in binding.model().enabled_targets() {
            match render_one(binding, target) {
                Ok(artifact) => artifacts.push(artifact),
                Err(details) => errors.push(CompileError::RenderFailed {
                    target,
                    step: binding.model().service_identity().canonical_name.clone(),
                    details,
                }),
            }
        }
    }

    if !errors.is_empty() {
        return Err(CompileError::PhaseFailed {
            phase: "rendering",
            errors,
        });
    }

    Ok(artifacts)
}

fn render_one(binding: &Binding, target: GenerationTarget) -> Result<Artifact, String> {
    match target {
        GenerationTarget::GrpcServer => grpc_server::render(binding),
        GenerationTarget::GrpcClient => grpc_client::render(binding),
        GenerationTarget::RestServer => rest_server::render(binding),
        GenerationTarget::RestClient => Err("REST client rendering is not required by any deployment role".to_string()),
        GenerationTarget::PluginServer => plugin_server::render(binding),
        GenerationTarget::PluginClient => plugin_client::render(binding),
        GenerationTarget::Orchestrator => orchestrator::render(binding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpf_ir::step_model::{
        DeploymentRole, ExecutionMode, GenerationTarget as GT, ParallelismHints, ServiceIdentity,
        StepModel, StreamingShape, TypeMapping,
    };

    fn grpc_model() -> StepModel {
        StepModel::new(
            ServiceIdentity {
                package: "com.example".into(),
                logical_name: "PriceStep".into(),
                canonical_name: "com.example.PriceStep".into(),
            },
            StreamingShape::UnaryInUnaryOut,
            TypeMapping::identity("Order".into()),
            TypeMapping::identity("Order".into()),
            ExecutionMode::Reactive,
            vec![GT::GrpcServer, GT::GrpcClient],
            DeploymentRole::PipelineServer,
            ParallelismHints::default(),
        )
        .expect("model satisfies its own invariants")
    }

    #[test]
    fn renders_one_artifact_per_enabled_target() {
        let binding = Binding::Grpc {
            model: grpc_model(),
            service_descriptor: tpf_ir::binding::ServiceDescriptor {
                service_name: "com.example.PriceStep".into(),
            },
            method_descriptor: tpf_ir::binding::MethodDescriptor {
                method_name: "PriceStep".into(),
            },
        };
        let artifacts = render_all(&[binding]).expect("rendering succeeds");
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().any(|a| a.role == Role::PipelineServer));
        assert!(artifacts.iter().any(|a| a.role == Role::OrchestratorClient));
    }
}
