// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Immutable intermediate representation (IR) for the transport pipeline framework.
//!
//! Data Model:
//! - [`template`]  — the build-time pipeline template (YAML discovery input)
//! - [`step_model`] — [`step_model::StepModel`], the transport-agnostic description of a step
//! - [`aspect`]    — cross-cutting concerns that may expand into synthetic side-effect steps
//! - [`orchestrator`] — the declared pipeline entry point
//! - [`binding`]   — transport-specific views derived from a [`step_model::StepModel`]
//! - [`step_config`] / [`pipeline_config`] — per-step and global runtime tunables
//! - [`context`]   — the propagated per-call pipeline context
//! - [`order`]     — the canonical ordered list of step names emitted at build time
//!
//! Build-time phases own [`step_model::StepModel`] values sequentially; once a compilation
//! round validates successfully they become read-only inputs for renderers. Nothing in this
//! crate mutates a model after construction — later phases only add siblings.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub mod aspect;
pub mod binding;
pub mod context;
pub mod error;
pub mod order;
pub mod orchestrator;
pub mod pipeline_config;
pub mod step_config;
pub mod step_model;
pub mod template;

/// The package or module a step belongs to (e.g. `com.example.orders`).
pub type PackageName = Cow<'static, str>;

/// The canonical, fully-qualified class/type name of a step (e.g. `com.example.orders.PriceStep`).
pub type StepName = Cow<'static, str>;

/// The name of a declared field on a wire or domain message.
pub type FieldName = Cow<'static, str>;

/// The application name declared by a pipeline template.
pub type AppName = Cow<'static, str>;

/// The transport selected for a pipeline template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transport {
    /// gRPC transport; ordinary steps are exposed as gRPC server/client bindings.
    Grpc,
    /// REST transport; ordinary steps are exposed as REST server bindings.
    Rest,
}

/// Error context carried alongside [`error::Error`] variants, mirroring the compiler's
/// notion of "where in the build we were" when a failure was detected.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// The step name under consideration, if any.
    pub step: Option<StepName>,
    /// The compiler phase in which the error was detected.
    pub phase: Option<&'static str>,
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.phase, &self.step) {
            (Some(phase), Some(step)) => write!(f, "phase={phase}, step={step}"),
            (Some(phase), None) => write!(f, "phase={phase}"),
            (None, Some(step)) => write!(f, "step={step}"),
            (None, None) => write!(f, "<no context>"),
        }
    }
}
