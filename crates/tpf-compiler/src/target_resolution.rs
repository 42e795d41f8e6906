// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Target Resolution (§4.1.3): maps (transport, step kind) to `enabled_targets`
//! and a `DeploymentRole`.

use crate::semantic::AnalyzedStep;
use tpf_ir::step_model::{DeploymentRole, GenerationTarget};
use tpf_ir::template::StepKind;
use tpf_ir::Transport;

/// A step together with the targets/role Target Resolution assigned it.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    /// The analyzed step this resolution applies to.
    pub analyzed: AnalyzedStep,
    /// The generation targets enabled for this step.
    pub enabled_targets: Vec<GenerationTarget>,
    /// The deployment role this step's rendered artifact belongs to.
    pub deployment_role: DeploymentRole,
}

/// Resolves `enabled_targets`/`deployment_role` for a single step, per the
/// (transport, kind) table:
///
/// | transport | kind     | targets                              |
/// |-----------|----------|---------------------------------------|
/// | GRPC      | ordinary | `GRPC_SERVER` ∪ `GRPC_CLIENT`          |
/// | REST      | ordinary | `REST_SERVER` ∪ `GRPC_CLIENT`          |
/// | any       | plugin   | `PLUGIN_SERVER` ∪ `PLUGIN_CLIENT`      |
///
/// `GRPC_CLIENT` is included for REST pipelines too ("GRPC_CLIENT-analog" in
/// the spec) since the orchestrator role always drives steps through a
/// generated client stub regardless of the server-side transport.
#[must_use]
pub fn resolve_step_for_transport(analyzed: AnalyzedStep, transport: Transport) -> ResolvedStep {
    match analyzed.declaration.kind {
        StepKind::Plugin => ResolvedStep {
            analyzed,
            enabled_targets: vec![GenerationTarget::PluginServer, GenerationTarget::PluginClient],
            deployment_role: DeploymentRole::PluginServer,
        },
        StepKind::Ordinary => {
            let enabled_targets = match transport {
                Transport::Grpc => vec![GenerationTarget::GrpcServer, GenerationTarget::GrpcClient],
                Transport::Rest => vec![GenerationTarget::RestServer, GenerationTarget::GrpcClient],
            };
            let deployment_role = match transport {
                Transport::Grpc => DeploymentRole::PipelineServer,
                Transport::Rest => DeploymentRole::RestServer,
            };
            ResolvedStep {
                analyzed,
                enabled_targets,
                deployment_role,
            }
        }
    }
}

/// The targets/role assigned to the orchestrator entry point itself, when one
/// is required.
#[must_use]
pub fn orchestrator_targets() -> (Vec<GenerationTarget>, DeploymentRole) {
    (
        vec![GenerationTarget::Orchestrator],
        DeploymentRole::OrchestratorClient,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpf_ir::step_model::{Cardinality, StreamingShape};
    use tpf_ir::template::StepDeclaration;

    fn analyzed(kind: StepKind) -> AnalyzedStep {
        AnalyzedStep {
            declaration: StepDeclaration {
                name: "com.example.PriceStep".into(),
                cardinality: Cardinality::OneToOne,
                input_type_name: "Order".to_string(),
                input_fields: vec![],
                output_type_name: "Order".to_string(),
                output_fields: vec![],
                parallel: None,
                ordering: None,
                thread_safety: None,
                kind,
            },
            streaming_shape: StreamingShape::UnaryInUnaryOut,
        }
    }

    #[test]
    fn grpc_ordinary_step_resolves_to_pipeline_server() {
        let resolved = resolve_step_for_transport(analyzed(StepKind::Ordinary), Transport::Grpc);
        assert_eq!(resolved.deployment_role, DeploymentRole::PipelineServer);
        assert!(resolved.enabled_targets.contains(&GenerationTarget::GrpcServer));
    }

    #[test]
    fn rest_ordinary_step_resolves_to_rest_server() {
        let resolved = resolve_step_for_transport(analyzed(StepKind::Ordinary), Transport::Rest);
        assert_eq!(resolved.deployment_role, DeploymentRole::RestServer);
        assert!(resolved.enabled_targets.contains(&GenerationTarget::RestServer));
        assert!(resolved.enabled_targets.contains(&GenerationTarget::GrpcClient));
    }

    #[test]
    fn plugin_step_resolves_regardless_of_transport() {
        let resolved = resolve_step_for_transport(analyzed(StepKind::Plugin), Transport::Rest);
        assert_eq!(resolved.deployment_role, DeploymentRole::PluginServer);
        assert!(resolved.enabled_targets.contains(&GenerationTarget::PluginServer));
        assert!(resolved.enabled_targets.contains(&GenerationTarget::PluginClient));
    }
}
