// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The pipeline runner: composes step instances into a single reactive flow with
//! explicit concurrency, ordering, retry, backpressure and failure-recovery semantics.
//!
//! Module map:
//! - [`registry`] — the link-time step registry populated by `#[tpf_macros::pipeline_step]`.
//! - [`step`] — the `Step` trait and its shape-specific `apply` signatures.
//! - [`error`] — the runtime error taxonomy.
//! - [`backoff`] — exponential backoff with optional jitter.
//! - [`runner`] — shape adaptation, `resolveParallel`, and the composed reactive flow.
//! - [`health`] — the startup readiness state machine.
//! - [`cache`] — the cache policy enforcer.
//! - [`telemetry`] — run/step counters and the retry-amplification kill-switch.
//! - [`context`] — task-local `PipelineContext` propagation.
//! - [`execution_service`] — the public `execute_streaming`/`execute_unary` entry point.
//! - [`testing`] (feature `testing`) — shared step test doubles.

pub use linkme::distributed_slice;

pub mod backoff;
pub mod cache;
pub mod context;
pub mod error;
pub mod execution_service;
pub mod health;
pub mod registry;
pub mod runner;
pub mod step;
pub mod telemetry;

#[cfg(feature = "testing")]
pub mod testing;
