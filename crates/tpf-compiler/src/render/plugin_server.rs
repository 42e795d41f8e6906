// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Renders the plugin host server-side handler into the `plugin-server` role.
//!
//! Plugin host expansion produces child bindings whose server-side handlers
//! delegate to the registered plugin implementation (§4.1.4).

use super::{Artifact, Role};
use tpf_ir::binding::Binding;

pub(super) fn render(binding: &Binding) -> Result<Artifact, String> {
    let model = binding.model();
    let identity = model.service_identity();
    let contents = format!(
        "// generated plugin host handler for {canonical}\n\
         pub struct {logical}PluginHost {{\n    \
             delegate: Box<dyn tpf_runtime::step::Step<{domain}>>,\n\
         }}\n",
        canonical = identity.canonical_name,
        logical = identity.logical_name,
        domain = model.input_mapping().domain_type,
    );

    Ok(Artifact {
        role: Role::PluginServer,
        step: identity.canonical_name.clone(),
        relative_path: format!("{}_plugin_host.rs", identity.logical_name.to_ascii_lowercase()),
        contents,
    })
}
