// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Renders the gRPC server-side handler for a step into the `pipeline-server` role.

use super::{Artifact, Role};
use tpf_ir::binding::Binding;

pub(super) fn render(binding: &Binding) -> Result<Artifact, String> {
    let Binding::Grpc {
        model,
        service_descriptor,
        method_descriptor,
    } = binding
    else {
        return Err("grpc_server renderer requires a Grpc binding".to_string());
    };

    let identity = model.service_identity();
    let contents = format!(
        "// generated gRPC server handler for {canonical}\n\
         pub struct {logical}Handler;\n\n\
         #[tonic::async_trait]\n\
         impl {service}Server for {logical}Handler {{\n    \
             async fn {method}(&self, request: tonic::Request<{input}>) -> Result<tonic::Response<{output}>, tonic::Status> {{\n        \
                 unimplemented!(\"delegates to the registered step implementation\")\n    \
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
        role: Role::PipelineServer,
        step: identity.canonical_name.clone(),
        relative_path: format!("{}_server.rs", identity.logical_name.to_ascii_lowercase()),
        contents,
    })
}
