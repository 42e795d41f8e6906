// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The annotation-driven compiler: turns a pipeline template into rendered
//! transport bindings and the canonical ordered-step resource.
//!
//! Phases, in strict execution order:
//! - [`discovery`] — loads and validates the pipeline template, cross-references
//!   declared steps against the link-time step registry.
//! - [`semantic`] — maps cardinality to streaming shape, flags expandable aspects,
//!   enforces the parallelism-hint/shape invariant.
//! - [`target_resolution`] — maps (transport, step kind) to enabled generation
//!   targets and deployment role.
//! - [`binding`] — constructs per-(step, target) bindings, including synthetic
//!   side-effect steps produced by aspect expansion.
//! - [`render`] — per-target renderers emitting artifacts into role-specific
//!   output directories.
//! - [`order_emission`] — serializes the canonical ordered-step resource.
//!
//! [`compile::compile`] chains all six phases within one round, short-circuiting
//! on the first phase that reports failures.

pub mod binding;
pub mod compile;
pub mod discovery;
pub mod error;
pub mod order_emission;
pub mod render;
pub mod semantic;
pub mod target_resolution;

pub use compile::{compile as compile_pipeline, CompileInput, CompileOutput};
pub use error::CompileError;
