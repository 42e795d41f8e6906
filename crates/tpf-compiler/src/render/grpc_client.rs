// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Renders a gRPC client stub for a step into the `orchestrator-client` role.

use super::{Artifact, Role};
use tpf_ir::binding::Binding;

pub(super) fn render(binding: &Binding) -> Result<Artifact, String> {
    let Binding::Grpc {
        model,
        service_descriptor,
        method_descriptor,
    } = binding
    else {
        return Err("grpc_client renderer requires a Grpc binding".to_string());
    };

    let identity = model.service_identity();
    let contents = format!(
        "// generated gRPC client stub for {canonical}\n\
         pub struct {logical}Client {{\n    \
             inner: {service}Client<tonic::transport::Channel>,\n\
         }}\n\n\
         impl {logical}Client {{\n    \
             pub async fn {method}(&mut self, request: {input}) -> Result<{output}, tonic::Status> {{\n        \
                 let response = self.inner.{method}(request).await?;\n        \
                 Ok(response.into_inner())\n    \
             }}\n\
         }}\n",
        canonical = identity.canonical_name,
        logical = identity.logical_name,
        service = service_descriptor.service_name,
        method = method_descriptor.method_name,
        input = model.input_mapping().wire_type.as_ref().unwrap_or(&model.input_mapping().domain_type),
        output = model.output_mapping().wire_type.as_ref().unwrap_or(&model.output_mapping().domain_type),
    );

    Ok(Artifact {
        role: Role::OrchestratorClient,
        step: identity.canonical_name.clone(),
        relative_path: format!("{}_client.rs", identity.logical_name.to_ascii_lowercase()),
        contents,
    })
}
