// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Cross-cutting concerns attached around steps.

use crate::StepName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an aspect runs relative to the step(s) it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    /// Runs before the owning step(s).
    BeforeStep,
    /// Runs after the owning step(s). Cache/persistence-category aspects at this
    /// position are expanded into synthetic `SIDE_EFFECT` steps during semantic analysis.
    AfterStep,
}

/// Which steps an aspect applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "value")]
pub enum Scope {
    /// Applies to every step in the pipeline.
    Global,
    /// Applies only to the named steps.
    StepSubset(Vec<StepName>),
}

/// A well-known aspect category consulted by semantic analysis to decide expansion.
///
/// An aspect's category is inferred from its declared name in the pipeline template;
/// unrecognized names fall back to `Other` and are never expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Aspects that read or write a result cache.
    Cache,
    /// Aspects that persist a result to durable storage.
    Persistence,
    /// Any other cross-cutting concern; never expanded into a synthetic step.
    Other,
}

impl Category {
    /// Infers a category from an aspect's declared name. Matching is case-insensitive
    /// substring matching against the well-known category keywords.
    #[must_use]
    pub fn infer(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("cache") {
            Category::Cache
        } else if lower.contains("persist") {
            Category::Persistence
        } else {
            Category::Other
        }
    }

    /// Whether aspects of this category are expanded into synthetic side-effect steps
    /// when declared at `Position::AfterStep`.
    #[must_use]
    pub const fn is_expandable(self) -> bool {
        matches!(self, Category::Cache | Category::Persistence)
    }
}

/// A single declared aspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectModel {
    /// The aspect's declared name, as written in the pipeline template.
    pub name: StepName,
    /// Where the aspect runs relative to its owning step(s).
    pub position: Position,
    /// Which steps the aspect applies to.
    pub scope: Scope,
    /// Relative execution order among aspects sharing the same position.
    pub order: i32,
    /// Whether the aspect is active; disabled aspects are retained in the IR but
    /// never expanded or rendered.
    pub enabled: bool,
    /// Free-form configuration, passed through to the aspect's renderer unchanged.
    pub config: BTreeMap<String, serde_yaml::Value>,
}

impl AspectModel {
    /// The inferred category of this aspect, from its declared name.
    #[must_use]
    pub fn category(&self) -> Category {
        Category::infer(&self.name)
    }

    /// Whether semantic analysis must expand this aspect into a synthetic
    /// `SIDE_EFFECT` step: it is enabled, positioned after the step, and its
    /// category is expandable.
    #[must_use]
    pub fn requires_expansion(&self) -> bool {
        self.enabled && self.position == Position::AfterStep && self.category().is_expandable()
    }

    /// Whether this aspect applies to the given step name.
    #[must_use]
    pub fn applies_to(&self, step: &str) -> bool {
        match &self.scope {
            Scope::Global => true,
            Scope::StepSubset(steps) => steps.iter().any(|s| s == step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_inference_is_case_insensitive() {
        assert_eq!(Category::infer("ResultCache"), Category::Cache);
        assert_eq!(Category::infer("PERSIST_ORDERS"), Category::Persistence);
        assert_eq!(Category::infer("AuditLog"), Category::Other);
    }

    #[test]
    fn only_enabled_after_step_expandable_aspects_require_expansion() {
        let base = AspectModel {
            name: "resultCache".into(),
            position: Position::AfterStep,
            scope: Scope::Global,
            order: 0,
            enabled: true,
            config: BTreeMap::new(),
        };
        assert!(base.requires_expansion());

        let before = AspectModel {
            position: Position::BeforeStep,
            ..base.clone()
        };
        assert!(!before.requires_expansion());

        let disabled = AspectModel {
            enabled: false,
            ..base.clone()
        };
        assert!(!disabled.requires_expansion());

        let other = AspectModel {
            name: "auditLog".into(),
            ..base
        };
        assert!(!other.requires_expansion());
    }

    #[test]
    fn scope_subset_matches_only_named_steps() {
        let aspect = AspectModel {
            name: "resultCache".into(),
            position: Position::AfterStep,
            scope: Scope::StepSubset(vec!["com.example.PriceStep".into()]),
            order: 0,
            enabled: true,
            config: BTreeMap::new(),
        };
        assert!(aspect.applies_to("com.example.PriceStep"));
        assert!(!aspect.applies_to("com.example.ShippingStep"));
    }
}
