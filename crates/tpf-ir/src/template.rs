// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The build-time pipeline template: the YAML discovery input consumed by Discovery (§4.1.1).

use crate::aspect::{AspectModel, Position, Scope};
use crate::error::Error;
use crate::step_model::Cardinality;
use crate::{Context, StepName, Transport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A field declared on a step's input or output type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// The field's name in the domain type.
    pub name: String,
    /// The field's domain-level type.
    #[serde(rename = "type")]
    pub field_type: String,
    /// The field's wire-level protobuf type.
    pub proto_type: String,
}

/// A single step declaration as written in the pipeline template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDeclaration {
    /// The step's declared name.
    pub name: StepName,
    /// The user-declared cardinality; mapped to a streaming shape during semantic analysis.
    pub cardinality: Cardinality,
    /// The step's input type name.
    pub input_type_name: String,
    /// The fields declared on the step's input type.
    #[serde(default)]
    pub input_fields: Vec<FieldDeclaration>,
    /// The step's output type name.
    pub output_type_name: String,
    /// The fields declared on the step's output type.
    #[serde(default)]
    pub output_fields: Vec<FieldDeclaration>,
    /// An explicit per-step parallelism override, if declared.
    #[serde(default)]
    pub parallel: Option<bool>,
    /// An explicit ordering hint, if declared; defaults to `RELAXED` (see
    /// [`crate::step_model::ParallelismHints`]) when absent, matching the step's
    /// own declared default.
    #[serde(default)]
    pub ordering: Option<crate::step_model::Ordering>,
    /// An explicit thread-safety hint, if declared; defaults to `SAFE` when absent.
    #[serde(default)]
    pub thread_safety: Option<crate::step_model::ThreadSafety>,
    /// Whether this step is an ordinary pipeline step or hosts/invokes a plugin
    /// implementation; consulted by target resolution (§4.1.3).
    #[serde(default)]
    pub kind: StepKind,
}

/// The kind of a declared step, consulted by target resolution to pick the
/// (transport, kind) → `enabled_targets` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    /// A regular pipeline step, resolved against the pipeline's transport.
    #[default]
    Ordinary,
    /// A step that hosts or invokes a plugin implementation, resolved the same
    /// way regardless of transport.
    Plugin,
}

impl StepDeclaration {
    /// The declared or defaulted parallelism hints for this step, consulted by
    /// semantic analysis's concurrency-combination check (§4.1.2).
    #[must_use]
    pub fn parallelism_hints(&self) -> crate::step_model::ParallelismHints {
        let defaults = crate::step_model::ParallelismHints::default();
        crate::step_model::ParallelismHints {
            ordering: self.ordering.unwrap_or(defaults.ordering),
            thread_safety: self.thread_safety.unwrap_or(defaults.thread_safety),
        }
    }
}

/// An aspect declaration as written in the pipeline template's `aspects` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectDeclaration {
    /// Whether this aspect is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Where the aspect runs relative to its owning step(s).
    pub position: Position,
    /// Which steps the aspect applies to.
    #[serde(default = "default_global_scope")]
    pub scope: Scope,
    /// Relative execution order among aspects sharing the same position.
    #[serde(default)]
    pub order: i32,
    /// Free-form configuration passed through to the aspect's renderer.
    #[serde(default)]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

fn default_true() -> bool {
    true
}

fn default_global_scope() -> Scope {
    Scope::Global
}

impl AspectDeclaration {
    /// Converts this raw declaration into an [`AspectModel`], under the given declared name.
    #[must_use]
    pub fn into_model(self, name: StepName) -> AspectModel {
        AspectModel {
            name,
            position: self.position,
            scope: self.scope,
            order: self.order,
            enabled: self.enabled,
            config: self.config,
        }
    }
}

/// The raw pipeline template, as read from the YAML discovery input.
///
/// Root fields: `appName`, `basePackage`, `transport`, `steps` (ordered), optional `aspects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTemplate {
    /// The declared application name.
    pub app_name: String,
    /// The base package new artifacts are generated under.
    pub base_package: String,
    /// The selected transport.
    pub transport: Transport,
    /// The ordered step declarations.
    pub steps: Vec<StepDeclaration>,
    /// Declared aspects, keyed by name.
    #[serde(default)]
    pub aspects: BTreeMap<String, AspectDeclaration>,
    /// An explicit orchestrator declaration, if this pipeline has an entry point.
    #[serde(default)]
    pub orchestrator: Option<OrchestratorDeclaration>,
}

/// An orchestrator declaration as written in the pipeline template's `orchestrator` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorDeclaration {
    /// Whether a generated CLI entry point is requested for this orchestrator.
    #[serde(default)]
    pub generate_cli: bool,
}

impl PipelineTemplate {
    /// Parses a pipeline template from a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        serde_yaml::from_str(content).map_err(|e| Error::DeserializationError {
            context: Context {
                step: None,
                phase: Some("discovery"),
            },
            format: "YAML",
            details: e.to_string(),
        })
    }

    /// Parses a pipeline template from a JSON document.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        serde_json::from_str(content).map_err(|e| Error::DeserializationError {
            context: Context {
                step: None,
                phase: Some("discovery"),
            },
            format: "JSON",
            details: e.to_string(),
        })
    }

    /// Loads a pipeline template from a file, dispatching on its extension
    /// (`.yaml`/`.yml` → YAML, `.json` → JSON).
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(Error::DeserializationError {
                context: Context {
                    step: None,
                    phase: Some("discovery"),
                },
                format: "unknown",
                details: format!(
                    "unrecognized template extension {other:?}; expected .yaml, .yml or .json"
                ),
            }),
        }
    }

    /// Validates that every step declaration has non-empty required fields.
    ///
    /// Discovery reports missing fields rather than panicking; this is called before
    /// the template is handed to semantic analysis.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.app_name.trim().is_empty() {
            errors.push(Error::MissingField {
                context: Context {
                    step: None,
                    phase: Some("discovery"),
                },
                field: "appName",
            });
        }
        if self.base_package.trim().is_empty() {
            errors.push(Error::MissingField {
                context: Context {
                    step: None,
                    phase: Some("discovery"),
                },
                field: "basePackage",
            });
        }

        for step in &self.steps {
            if step.name.trim().is_empty() {
                errors.push(Error::MissingField {
                    context: Context {
                        step: None,
                        phase: Some("discovery"),
                    },
                    field: "steps[].name",
                });
                continue;
            }
            if step.input_type_name.trim().is_empty() {
                errors.push(Error::MissingField {
                    context: Context {
                        step: Some(step.name.clone()),
                        phase: Some("discovery"),
                    },
                    field: "steps[].inputTypeName",
                });
            }
            if step.output_type_name.trim().is_empty() {
                errors.push(Error::MissingField {
                    context: Context {
                        step: Some(step.name.clone()),
                        phase: Some("discovery"),
                    },
                    field: "steps[].outputTypeName",
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidTemplate { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TEMPLATE: &str = r#"
appName: orders
basePackage: com.example.orders
transport: GRPC
steps:
  - name: PriceStep
    cardinality: ONE_TO_ONE
    inputTypeName: Order
    outputTypeName: Order
"#;

    #[test]
    fn parses_minimal_template() {
        let template = PipelineTemplate::from_yaml(MINIMAL_TEMPLATE).expect("valid template");
        assert_eq!(template.app_name, "orders");
        assert_eq!(template.transport, Transport::Grpc);
        assert_eq!(template.steps.len(), 1);
        assert_eq!(template.steps[0].cardinality, Cardinality::OneToOne);
    }

    #[test]
    fn validate_reports_missing_required_fields() {
        let template = PipelineTemplate {
            app_name: String::new(),
            base_package: "com.example".to_string(),
            transport: Transport::Grpc,
            steps: vec![],
            aspects: BTreeMap::new(),
            orchestrator: None,
        };
        let result = template.validate();
        assert!(matches!(result, Err(Error::InvalidTemplate { .. })));
    }

    #[test]
    fn rejects_unknown_transport_value() {
        let with_bad_transport = MINIMAL_TEMPLATE.replace("GRPC", "CARRIER_PIGEON");
        let result = PipelineTemplate::from_yaml(&with_bad_transport);
        assert!(result.is_err());
    }
}
