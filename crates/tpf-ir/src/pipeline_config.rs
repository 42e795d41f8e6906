// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Global runtime configuration shared by every step in a pipeline.

use crate::step_config::{StepConfig, StepConfigOverride};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The runner's policy for deciding whether a step runs sequentially or in parallel.
///
/// See `resolveParallel` for how this interacts with a step's declared
/// [`crate::step_model::ParallelismHints`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Parallelism {
    /// Decide per step from its declared hints (see `resolveParallel` rule 6).
    Auto,
    /// Always run sequentially, one item at a time, in arrival order.
    Sequential,
    /// Always run with bounded concurrency up to `max_concurrency`.
    Parallel,
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Auto
    }
}

/// Global, per-profile pipeline configuration: `pipeline.defaults.*`, `pipeline.parallelism`,
/// `pipeline.max-concurrency`, and the map of per-step override fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// The step tunable defaults for the active profile.
    pub defaults: StepConfig,
    /// The global parallelism policy.
    pub parallelism: Parallelism,
    /// The maximum number of concurrently in-flight items for parallel steps.
    /// Values below 1 are clamped to 1 by [`PipelineConfig::effective_max_concurrency`].
    pub max_concurrency: usize,
    /// Per-step override fragments, keyed by the step's fully-qualified canonical name.
    pub step_overrides: BTreeMap<String, StepConfigOverride>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            defaults: StepConfig::default(),
            parallelism: Parallelism::default(),
            max_concurrency: 128,
            step_overrides: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// `max_concurrency`, clamped to at least 1.
    #[must_use]
    pub fn effective_max_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Computes the effective [`StepConfig`] for a named step: the active profile's
    /// defaults overlaid with that step's override fragment, if any.
    #[must_use]
    pub fn effective_step_config(&self, canonical_step_name: &str) -> StepConfig {
        match self.step_overrides.get(canonical_step_name) {
            Some(overrides) => self.defaults.merged_with(overrides),
            None => self.defaults.clone(),
        }
    }
}
