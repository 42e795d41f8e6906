// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Renders the REST server-side handler for a step into the `rest-server` role.

use super::{Artifact, Role};
use tpf_ir::binding::Binding;

pub(super) fn render(binding: &Binding) -> Result<Artifact, String> {
    let Binding::Rest { model, path_override } = binding else {
        return Err("rest_server renderer requires a Rest binding".to_string());
    };

    let identity = model.service_identity();
    let path = path_override
        .clone()
        .unwrap_or_else(|| format!("/{}", identity.logical_name.to_ascii_lowercase()).into());
    let contents = format!(
        "// generated REST handler for {canonical}\n\
         #[axum::debug_handler]\n\
         pub async fn {handler_fn}(axum::Json(request): axum::Json<{input}>) -> axum::Json<{output}> {{\n    \
             unimplemented!(\"delegates to the registered step implementation\")\n\
         }}\n\n\
         pub fn route() -> axum::Router {{\n    \
             axum::Router::new().route(\"{path}\", axum::routing::post({handler_fn}))\n\
         }}\n",
        canonical = identity.canonical_name,
        handler_fn = identity.logical_name.to_ascii_lowercase(),
        input = model.input_mapping().domain_type,
        output = model.output_mapping().domain_type,
        path = path,
    );

    Ok(Artifact {
        role: Role::RestServer,
        step: identity.canonical_name.clone(),
        relative_path: format!("{}_handler.rs", identity.logical_name.to_ascii_lowercase()),
        contents,
    })
}
