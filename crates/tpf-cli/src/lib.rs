// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The transport pipeline framework's build-time codegen CLI and runtime
//! service CLI.
//!
//! Module map:
//! - [`config`] — layered `PipelineConfig` loading (defaults → file → env →
//!   flags).
//! - [`codegen`] — runs [`tpf_compiler::compile_pipeline`] and writes the
//!   resulting artifacts and `order.json` to disk.
//! - [`service`] — hosts a running `ExecutionService` on a dedicated thread,
//!   exposing status and graceful shutdown.
//! - [`observed_state`] — the JSON-serializable status view of a running
//!   service.
//! - [`thread_task`] — the dedicated-thread-plus-`LocalSet` primitive
//!   [`service`] is built on.
//! - [`error`] — this crate's error taxonomy.

pub mod codegen;
pub mod config;
pub mod error;
pub mod observed_state;
pub mod service;
pub mod thread_task;
