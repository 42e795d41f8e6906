// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Renders a plugin invocation stub into the `plugin-client` role.

use super::{Artifact, Role};
use tpf_ir::binding::Binding;

pub(super) fn render(binding: &Binding) -> Result<Artifact, String> {
    let model = binding.model();
    let identity = model.service_identity();
    let contents = format!(
        "// generated plugin client stub for {canonical}\n\
         pub struct {logical}PluginClient {{\n    \
             channel: tpf_channel::mpsc::Sender<{domain}>,\n\
         }}\n",
        canonical = identity.canonical_name,
        logical = identity.logical_name,
        domain = model.output_mapping().domain_type,
    );

    Ok(Artifact {
        role: Role::PluginClient,
        step: identity.canonical_name.clone(),
        relative_path: format!("{}_plugin_client.rs", identity.logical_name.to_ascii_lowercase()),
        contents,
    })
}
