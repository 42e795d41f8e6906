// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Renders the orchestrator entry-point wiring into the `orchestrator-client` role.

use super::{Artifact, Role};
use tpf_ir::binding::Binding;

pub(super) fn render(binding: &Binding) -> Result<Artifact, String> {
    let Binding::Orchestrator {
        model,
        module_steps,
        client_defaults,
    } = binding
    else {
        return Err("orchestrator renderer requires an Orchestrator binding".to_string());
    };

    let identity = model.service_identity();
    let module_list = module_steps
        .iter()
        .map(|s| format!("        \"{s}\","))
        .collect::<Vec<_>>()
        .join("\n");
    let prefix = client_defaults
        .config_key_prefix
        .clone()
        .unwrap_or_default();
    let contents = format!(
        "// generated orchestrator entry point for {canonical}\n\
         pub const MODULE_STEPS: &[&str] = &[\n{modules}\n    ];\n\n\
         pub const CLIENT_CONFIG_PREFIX: &str = \"{prefix}\";\n\n\
         pub async fn run() -> anyhow::Result<()> {{\n    \
             unimplemented!(\"dispatches MODULE_STEPS through their generated client stubs\")\n\
         }}\n",
        canonical = identity.canonical_name,
        modules = module_list,
        prefix = prefix,
    );

    Ok(Artifact {
        role: Role::OrchestratorClient,
        step: identity.canonical_name.clone(),
        relative_path: "orchestrator.rs".to_string(),
        contents,
    })
}
