// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the CLI crate.

use miette::Diagnostic;

/// Errors that can occur in the CLI crate.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// Compilation of a pipeline template failed.
    #[error("compilation failed: {0}")]
    Compile(#[from] tpf_compiler::CompileError),

    /// Loading or merging the runtime configuration failed.
    #[error("configuration error: {details}")]
    Configuration {
        /// A human-readable description of the failure.
        details: String,
    },

    /// Writing a rendered artifact or the ordered-step resource to disk failed.
    #[error("failed to write '{path}': {source}")]
    Io {
        /// The path that failed to be written or read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The execution service reported a runtime error while serving a run.
    #[error("runtime error: {0}")]
    Runtime(#[from] tpf_runtime::error::RuntimeError),

    /// Failed to spawn an OS thread for the execution service.
    #[error("failed to spawn thread '{thread_name}': {source}")]
    ThreadSpawnError {
        /// Name of the thread we attempted to spawn.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The execution service thread panicked.
    #[error("thread '{thread_name}' panicked: {panic_message}")]
    ThreadJoinPanic {
        /// The thread name that panicked.
        thread_name: String,
        /// Panic message.
        panic_message: String,
    },
}
