// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The build-time codegen command: runs the compiler against a pipeline
//! template and writes the resulting artifacts and `order.json` to disk.

use crate::error::Error;
use std::collections::BTreeSet;
use std::path::Path;
use tpf_compiler::{compile_pipeline, render::Artifact, CompileInput, CompileOutput};
use tpf_ir::order::RESOURCE_PATH;
use tpf_ir::template::PipelineTemplate;
use tracing::info;

/// Compiles `template` against `registered_steps` and writes every rendered
/// artifact under `output_dir/<role source root>/<relative_path>`, plus the
/// canonical ordered-step resource at `output_dir/<RESOURCE_PATH>`.
///
/// Returns the compiled output for callers that want it (e.g. to print a
/// summary), after every file has been written successfully.
pub fn generate(
    template: PipelineTemplate,
    registered_steps: BTreeSet<String>,
    output_dir: &Path,
) -> Result<CompileOutput, Error> {
    let output = compile_pipeline(CompileInput {
        template,
        registered_steps,
    })?;

    for artifact in &output.artifacts {
        write_artifact(output_dir, artifact)?;
    }
    write_order_resource(output_dir, &output.order_json)?;

    info!(
        artifacts = output.artifacts.len(),
        steps = output.ordered_steps.len(),
        "codegen complete"
    );
    Ok(output)
}

fn write_artifact(output_dir: &Path, artifact: &Artifact) -> Result<(), Error> {
    let root = tpf_compiler::compile::output_root(output_dir, artifact.role);
    let path = root.join(&artifact.relative_path);
    write_file(&path, &artifact.contents)
}

fn write_order_resource(output_dir: &Path, order_json: &str) -> Result<(), Error> {
    let path = output_dir.join(RESOURCE_PATH);
    write_file(&path, order_json)
}

fn write_file(path: &Path, contents: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tpf_ir::step_model::Cardinality;
    use tpf_ir::template::{StepDeclaration, StepKind};
    use tpf_ir::Transport;

    fn minimal_template() -> PipelineTemplate {
        PipelineTemplate {
            app_name: "orders".to_string(),
            base_package: "com.example.orders".to_string(),
            transport: Transport::Grpc,
            steps: vec![StepDeclaration {
                name: "PriceStep".to_string().into(),
                cardinality: Cardinality::OneToOne,
                input_type_name: "Order".to_string(),
                input_fields: vec![],
                output_type_name: "Order".to_string(),
                output_fields: vec![],
                parallel: None,
                ordering: None,
                thread_safety: None,
                kind: StepKind::Ordinary,
            }],
            aspects: BTreeMap::new(),
            orchestrator: None,
        }
    }

    #[test]
    fn writes_every_artifact_and_the_order_resource() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registered = BTreeSet::from(["PriceStep".to_string()]);
        let output = generate(minimal_template(), registered, dir.path()).expect("codegen succeeds");

        let order_path = dir.path().join(RESOURCE_PATH);
        assert!(order_path.exists());
        let order_contents = std::fs::read_to_string(&order_path).expect("reads");
        assert!(order_contents.contains("com.example.orders.PriceStep"));

        for artifact in &output.artifacts {
            let root = tpf_compiler::compile::output_root(dir.path(), artifact.role);
            assert!(root.join(&artifact.relative_path).exists());
        }
    }

    #[test]
    fn propagates_compile_failures_without_writing_anything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = generate(minimal_template(), BTreeSet::new(), dir.path());
        assert!(result.is_err());
        let order_path = dir.path().join(RESOURCE_PATH);
        assert!(!order_path.exists());
    }
}
