// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Layered [`PipelineConfig`] loading (§6 "Config loading"): compiled-in
//! defaults, overlaid by an optional `pipeline.{yaml,json}` file, overlaid by
//! `PIPELINE_`-prefixed environment variables, overlaid by CLI flags.

use crate::error::Error;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tpf_ir::pipeline_config::{Parallelism, PipelineConfig};

/// The default candidate file names consulted when no `--config` path is given.
const DEFAULT_CANDIDATES: [&str; 2] = ["pipeline.yaml", "pipeline.json"];

/// The CLI-flag layer: every field is `None` unless the flag was actually
/// passed, so serializing this only ever contributes explicitly-set fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    /// Overrides [`PipelineConfig::max_concurrency`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Overrides [`PipelineConfig::parallelism`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<Parallelism>,
}

/// Loads [`PipelineConfig`] by layering, in increasing precedence: compiled-in
/// defaults, an optional config file, `PIPELINE_`-prefixed environment
/// variables, then `overrides`.
///
/// `explicit_path` is a user-supplied `--config` path; when absent, the
/// current directory is checked for `pipeline.yaml` then `pipeline.json` and
/// the layer is skipped entirely if neither exists.
pub fn load(explicit_path: Option<&Path>, overrides: ConfigOverrides) -> Result<PipelineConfig, Error> {
    let mut value = serde_json::to_value(PipelineConfig::default()).map_err(|e| Error::Configuration {
        details: format!("failed to serialize compiled-in defaults: {e}"),
    })?;

    if let Some(path) = resolve_file_path(explicit_path)? {
        let contents = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_value = parse_by_extension(&path, &contents)?;
        merge(&mut value, file_value);
    }

    apply_env_overrides(&mut value)?;

    let override_value = serde_json::to_value(&overrides).map_err(|e| Error::Configuration {
        details: format!("failed to serialize CLI overrides: {e}"),
    })?;
    merge(&mut value, override_value);

    serde_json::from_value(value).map_err(|e| Error::Configuration {
        details: format!("merged configuration does not match the expected shape: {e}"),
    })
}

fn resolve_file_path(explicit_path: Option<&Path>) -> Result<Option<PathBuf>, Error> {
    if let Some(path) = explicit_path {
        return if path.exists() {
            Ok(Some(path.to_path_buf()))
        } else {
            Err(Error::Configuration {
                details: format!("config file '{}' does not exist", path.display()),
            })
        };
    }
    for candidate in DEFAULT_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn parse_by_extension(path: &Path, contents: &str) -> Result<Value, Error> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(contents).map_err(|e| Error::Configuration {
            details: format!("'{}' is not valid YAML: {e}", path.display()),
        }),
        Some("json") => serde_json::from_str(contents).map_err(|e| Error::Configuration {
            details: format!("'{}' is not valid JSON: {e}", path.display()),
        }),
        other => Err(Error::Configuration {
            details: format!("unrecognized config file extension {other:?}; expected .yaml, .yml or .json"),
        }),
    }
}

/// Deep-merges `overlay` into `base`, taking the overlay's value for every
/// key it sets and leaving everything else in `base` untouched.
fn merge(base: &mut Value, overlay: Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, &overlay) {
        for (key, overlay_value) in overlay_map {
            let slot = base_map.entry(key.clone()).or_insert(Value::Null);
            merge(slot, overlay_value.clone());
        }
        return;
    }
    *base = overlay;
}

/// Applies every `PIPELINE_`-prefixed environment variable as an overlay,
/// splitting the remainder on `__` into a nested path (e.g.
/// `PIPELINE_DEFAULTS__RETRY_LIMIT` → `defaults.retry_limit`).
fn apply_env_overrides(value: &mut Value) -> Result<(), Error> {
    for (name, raw) in std::env::vars() {
        let Some(path) = name.strip_prefix("PIPELINE_") else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        let segments: Vec<String> = path.split("__").map(|s| s.to_lowercase()).collect();
        set_path(value, &segments, parse_env_value(&raw))?;
    }
    Ok(())
}

fn parse_env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_path(value: &mut Value, segments: &[String], leaf: Value) -> Result<(), Error> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    let map = value.as_object_mut().ok_or_else(|| Error::Configuration {
        details: "expected an object while applying environment overrides".to_string(),
    })?;
    if rest.is_empty() {
        let _ = map.insert(head.clone(), leaf);
        return Ok(());
    }
    let slot = map.entry(head.clone()).or_insert(Value::Null);
    set_path(slot, rest, leaf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn falls_back_to_compiled_defaults_with_no_file_or_overrides() {
        let config = load(None, ConfigOverrides::default()).expect("loads");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn file_layer_overrides_compiled_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(file, r#"{{"max_concurrency": 64}}"#).expect("write");
        let config = load(Some(&path), ConfigOverrides::default()).expect("loads");
        assert_eq!(config.max_concurrency, 64);
    }

    #[test]
    fn cli_overrides_take_precedence_over_the_file_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(file, r#"{{"max_concurrency": 64}}"#).expect("write");
        let overrides = ConfigOverrides {
            max_concurrency: Some(256),
            parallelism: None,
        };
        let config = load(Some(&path), overrides).expect("loads");
        assert_eq!(config.max_concurrency, 256);
    }

    #[test]
    fn merge_preserves_untouched_sibling_fields() {
        let mut base = serde_json::json!({"defaults": {"retry_limit": 3, "jitter": false}});
        let overlay = serde_json::json!({"defaults": {"retry_limit": 9}});
        merge(&mut base, overlay);
        assert_eq!(base["defaults"]["retry_limit"], 9);
        assert_eq!(base["defaults"]["jitter"], false);
    }

    #[test]
    fn set_path_builds_nested_objects_from_a_double_underscore_path() {
        let mut value = serde_json::json!({});
        set_path(&mut value, &["defaults".to_string(), "retry_limit".to_string()], Value::from(7)).expect("sets");
        assert_eq!(value["defaults"]["retry_limit"], 7);
    }
}
