// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The step contract applied by the runner.

use crate::error::RuntimeError;
use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use tpf_ir::step_config::StepConfig;
use tpf_ir::step_model::{ParallelismHints, StreamingShape};

/// The shape-appropriate carrier passed to and returned from [`Step::apply`].
///
/// A step's own `streaming_shape` determines which variant it is invoked with and
/// which variant it must return; the runner performs shape adaptation (materializing
/// a unary value into a one-element stream, or fanning a stream out per element)
/// before calling `apply` so that a step never has to special-case its caller.
///
/// Streams are `LocalBoxStream`, not the `Send`-bounded `BoxStream`: the runner
/// drives every flow from within a single-threaded reactive scope (a
/// `tokio::task::LocalSet`) and shares step instances and telemetry via `Rc`,
/// matching the rest of this crate's `?Send` posture.
pub enum Flow<T> {
    /// A single, deferred value.
    Unary(T),
    /// A lazily-produced sequence of values.
    Stream(LocalBoxStream<'static, T>),
}

impl<T: 'static> Flow<T> {
    /// Materializes a unary value into a one-element stream; used when a
    /// stream-input step is fed a unary upstream result.
    #[must_use]
    pub fn into_stream(self) -> LocalBoxStream<'static, T> {
        match self {
            Flow::Unary(value) => Box::pin(futures::stream::once(async move { value })),
            Flow::Stream(stream) => stream,
        }
    }
}

/// A unit of work applied by the runner, matching the streaming shape declared in
/// its `StepModel`.
///
/// Implementations are long-lived, shared components: a single instance is created
/// and invoked many times across runs. Implementations must honor their declared
/// [`ParallelismHints::thread_safety`]; `UNSAFE` steps are never invoked concurrently
/// by a correctly-configured runner.
#[async_trait(?Send)]
pub trait Step<T: 'static>: 'static {
    /// The streaming shape this step was resolved to during semantic analysis.
    fn streaming_shape(&self) -> StreamingShape;

    /// This step's declared parallelism hints; `(RELAXED, SAFE)` if none were declared.
    fn parallelism_hints(&self) -> ParallelismHints {
        ParallelismHints::default()
    }

    /// This step's effective runtime tunables (retry, backoff, backpressure).
    fn config(&self) -> &StepConfig;

    /// Applies this step to `input`, shaped per `streaming_shape`.
    async fn apply(&self, input: Flow<T>) -> Result<Flow<T>, RuntimeError>;

    /// Produces a replacement output for a failed input after retries are
    /// exhausted. Only consulted when the step's effective `recover_on_failure`
    /// is `true`. The default drops the failed input with no substitute.
    fn recover(&self, _failed_input: &T, _error: &RuntimeError) -> Option<T> {
        None
    }
}
