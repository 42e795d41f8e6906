// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Binding Construction (§4.1.4): builds a [`Binding`] per (step, target) pair,
//! inserting synthetic `SIDE_EFFECT` steps for expandable aspects and, when
//! required, an orchestrator entry-point binding.

use crate::error::CompileError;
use crate::semantic::SemanticOutput;
use crate::target_resolution::{orchestrator_targets, resolve_step_for_transport};
use tpf_ir::binding::{Binding, ClientDefaults, MethodDescriptor, ServiceDescriptor};
use tpf_ir::step_model::{
    DeploymentRole, ExecutionMode, GenerationTarget, ParallelismHints, ServiceIdentity, StepModel,
    TypeMapping,
};
use tpf_ir::{PackageName, StepName, Transport};

/// Everything Binding Construction produces: the bindings to render and the
/// canonical step order (including synthetic side-effect steps), ready for
/// Order Emission.
#[derive(Debug, Clone)]
pub struct BoundPipeline {
    /// One binding per rendered (step, target) pair, in canonical order.
    pub bindings: Vec<Binding>,
    /// Canonical step names, in the order the runner must apply them.
    pub ordered_steps: Vec<StepName>,
}

fn service_identity(base_package: &str, declared_name: &str) -> ServiceIdentity {
    let canonical_name: StepName = if declared_name.contains('.') {
        declared_name.to_string().into()
    } else {
        format!("{base_package}.{declared_name}").into()
    };
    let logical_name: StepName = declared_name
        .rsplit('.')
        .next()
        .unwrap_or(declared_name)
        .to_string()
        .into();
    ServiceIdentity {
        package: PackageName::from(base_package.to_string()),
        logical_name,
        canonical_name,
    }
}

/// Runs Binding Construction against Semantic Analysis's output.
pub fn construct(
    semantic: SemanticOutput,
    transport: Transport,
    base_package: &str,
) -> Result<BoundPipeline, CompileError> {
    let mut bindings = Vec::new();
    let mut ordered_steps = Vec::new();
    let mut errors = Vec::new();

    for analyzed in semantic.steps {
        let declared_name = analyzed.declaration.name.clone();
        let input_type = analyzed.declaration.input_type_name.clone();
        let output_type = analyzed.declaration.output_type_name.clone();
        let shape = analyzed.streaming_shape;
        let resolved = resolve_step_for_transport(analyzed, transport);

        let identity = service_identity(base_package, declared_name.as_ref());
        let canonical_name = identity.canonical_name.clone();

        let model = match StepModel::new(
            identity,
            shape,
            TypeMapping::identity(input_type.into()),
            TypeMapping::identity(output_type.clone().into()),
            ExecutionMode::Reactive,
            resolved.enabled_targets.clone(),
            resolved.deployment_role,
            ParallelismHints::default(),
        ) {
            Ok(model) => model,
            Err(source) => {
                errors.push(CompileError::ModelConstruction {
                    step: declared_name.clone(),
                    source,
                });
                continue;
            }
        };

        ordered_steps.push(canonical_name.clone());
        bindings.push(binding_for(model, &resolved.enabled_targets));

        for aspect in &semantic.expandable_aspects {
            if !aspect.applies_to(declared_name.as_ref()) {
                continue;
            }
            let synthetic_name: StepName =
                format!("{base_package}.{}${}", aspect.name, identity_suffix(declared_name.as_ref()))
                    .into();
            match StepModel::synthetic_side_effect(
                synthetic_name.clone(),
                PackageName::from(base_package.to_string()),
                output_type.clone().into(),
                resolved.deployment_role,
                resolved.enabled_targets.clone(),
            ) {
                Ok(synthetic_model) => {
                    ordered_steps.push(synthetic_name);
                    bindings.push(binding_for(synthetic_model, &resolved.enabled_targets));
                }
                Err(source) => errors.push(CompileError::ModelConstruction {
                    step: declared_name.clone(),
                    source,
                }),
            }
        }
    }

    if semantic.needs_orchestrator {
        match orchestrator_binding(base_package, &ordered_steps) {
            Ok(binding) => bindings.push(binding),
            Err(source) => errors.push(CompileError::ModelConstruction {
                step: format!("{base_package}.Orchestrator").into(),
                source,
            }),
        }
    }

    if !errors.is_empty() {
        return Err(CompileError::PhaseFailed {
            phase: "binding_construction",
            errors,
        });
    }

    Ok(BoundPipeline {
        bindings,
        ordered_steps,
    })
}

fn identity_suffix(declared_name: &str) -> &str {
    declared_name.rsplit('.').next().unwrap_or(declared_name)
}

fn binding_for(model: StepModel, enabled_targets: &[GenerationTarget]) -> Binding {
    if enabled_targets.contains(&GenerationTarget::RestServer) {
        Binding::Rest {
            model,
            path_override: None,
        }
    } else {
        let service_name = model.service_identity().canonical_name.clone();
        let method_name = model.service_identity().logical_name.clone();
        Binding::Grpc {
            model,
            service_descriptor: ServiceDescriptor { service_name },
            method_descriptor: MethodDescriptor { method_name },
        }
    }
}

fn orchestrator_binding(
    base_package: &str,
    module_steps: &[StepName],
) -> Result<Binding, tpf_ir::error::Error> {
    let (enabled_targets, deployment_role) = orchestrator_targets();
    let identity = ServiceIdentity {
        package: PackageName::from(base_package.to_string()),
        logical_name: "Orchestrator".into(),
        canonical_name: format!("{base_package}.Orchestrator").into(),
    };
    let model = StepModel::new(
        identity,
        tpf_ir::step_model::StreamingShape::SideEffect,
        TypeMapping::identity("Void".into()),
        TypeMapping::identity("Void".into()),
        ExecutionMode::Reactive,
        enabled_targets,
        deployment_role,
        ParallelismHints::default(),
    )?;
    Ok(Binding::Orchestrator {
        model,
        module_steps: module_steps.to_vec(),
        client_defaults: ClientDefaults {
            config_key_prefix: Some(base_package.to_string().into()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;
    use crate::semantic::analyze;
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;
    use tpf_ir::aspect::{AspectDeclaration, Position, Scope};
    use tpf_ir::step_model::Cardinality;
    use tpf_ir::template::{OrchestratorDeclaration, PipelineTemplate, StepDeclaration, StepKind};

    fn step(name: &str, cardinality: Cardinality) -> StepDeclaration {
        StepDeclaration {
            name: name.to_string().into(),
            cardinality,
            input_type_name: "Order".to_string(),
            input_fields: vec![],
            output_type_name: "Order".to_string(),
            output_fields: vec![],
            parallel: None,
            ordering: None,
            thread_safety: None,
            kind: StepKind::Ordinary,
        }
    }

    #[test]
    fn builds_one_binding_per_ordinary_step() {
        let template = PipelineTemplate {
            app_name: "orders".to_string(),
            base_package: "com.example.orders".to_string(),
            transport: Transport::Grpc,
            steps: vec![step("PriceStep", Cardinality::OneToOne)],
            aspects: BTreeMap::new(),
            orchestrator: None,
        };
        let registered = BTreeSet::from(["PriceStep".to_string()]);
        let discovery = discover(template, &registered).expect("discovery succeeds");
        let semantic = analyze(discovery).expect("semantic analysis succeeds");
        let bound = construct(semantic, Transport::Grpc, "com.example.orders")
            .expect("binding construction succeeds");
        assert_eq!(bound.bindings.len(), 1);
        assert_eq!(bound.ordered_steps, vec![StepName::from("com.example.orders.PriceStep")]);
    }

    #[test]
    fn expands_after_step_cache_aspect_into_synthetic_step() {
        let mut aspects = BTreeMap::new();
        aspects.insert(
            "resultCache".to_string(),
            AspectDeclaration {
                enabled: true,
                position: Position::AfterStep,
                scope: Scope::Global,
                order: 0,
                config: BTreeMap::new(),
            },
        );
        let template = PipelineTemplate {
            app_name: "orders".to_string(),
            base_package: "com.example.orders".to_string(),
            transport: Transport::Grpc,
            steps: vec![step("PriceStep", Cardinality::OneToOne)],
            aspects,
            orchestrator: Some(OrchestratorDeclaration { generate_cli: true }),
        };
        let registered = BTreeSet::from(["PriceStep".to_string()]);
        let discovery = discover(template, &registered).expect("discovery succeeds");
        let semantic = analyze(discovery).expect("semantic analysis succeeds");
        let bound = construct(semantic, Transport::Grpc, "com.example.orders")
            .expect("binding construction succeeds");
        assert_eq!(bound.ordered_steps.len(), 2);
        assert!(bound.ordered_steps[1].contains("resultCache"));
        assert!(matches!(bound.bindings.last(), Some(Binding::Orchestrator { .. })));
    }
}
