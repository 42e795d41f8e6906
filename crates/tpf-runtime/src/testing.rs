// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared test doubles for step implementations, gated behind the `testing`
//! feature so downstream crates (and this crate's own integration-style
//! tests) can build a [`StepHandle`] without repeating a `Step` impl per test.

use crate::error::RuntimeError;
use crate::runner::StepHandle;
use crate::step::{Flow, Step};
use async_trait::async_trait;
use std::rc::Rc;
use tpf_ir::step_config::StepConfig;
use tpf_ir::step_model::StreamingShape;

/// A unary-in/unary-out step built from a plain closure, for tests that only
/// care about composing steps and don't need a purpose-built `Step` impl.
pub struct FnStep<T, F> {
    shape: StreamingShape,
    config: StepConfig,
    f: F,
    _marker: std::marker::PhantomData<T>,
}

impl<T, F> FnStep<T, F>
where
    T: 'static,
    F: Fn(Flow<T>) -> Result<Flow<T>, RuntimeError> + 'static,
{
    /// Builds a step with the given shape and config, delegating `apply` to `f`.
    pub fn new(shape: StreamingShape, config: StepConfig, f: F) -> Self {
        Self {
            shape,
            config,
            f,
            _marker: std::marker::PhantomData,
        }
    }

    /// Wraps this step in a [`StepHandle`] named `canonical_name`, with no
    /// per-step `parallel:` override.
    #[must_use]
    pub fn into_handle(self, canonical_name: &str) -> StepHandle<T> {
        StepHandle {
            canonical_name: canonical_name.to_string(),
            step: Rc::new(self),
            parallel_override: None,
        }
    }
}

#[async_trait(?Send)]
impl<T, F> Step<T> for FnStep<T, F>
where
    T: 'static,
    F: Fn(Flow<T>) -> Result<Flow<T>, RuntimeError> + 'static,
{
    fn streaming_shape(&self) -> StreamingShape {
        self.shape
    }

    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn apply(&self, input: Flow<T>) -> Result<Flow<T>, RuntimeError> {
        (self.f)(input)
    }
}

/// Builds a [`StepHandle`] for a unary-in/unary-out step that applies `f` to
/// each item, with default [`StepConfig`].
#[must_use]
pub fn unary_step<T, F>(canonical_name: &str, f: F) -> StepHandle<T>
where
    T: Clone + 'static,
    F: Fn(T) -> T + 'static,
{
    FnStep::new(StreamingShape::UnaryInUnaryOut, StepConfig::default(), move |flow| match flow {
        Flow::Unary(value) => Ok(Flow::Unary(f(value))),
        Flow::Stream(_) => Err(RuntimeError::Shape {
            step: canonical_name.to_string(),
            details: "unary-input step received a stream".to_string(),
        }),
    })
    .into_handle(canonical_name)
}

/// Builds a [`StepHandle`] that echoes its input unchanged, for tests that
/// only need a placeholder step in the chain.
#[must_use]
pub fn identity_step<T>(canonical_name: &str) -> StepHandle<T>
where
    T: Clone + 'static,
{
    unary_step(canonical_name, |value| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run_pipeline;
    use crate::telemetry::TelemetryHandle;
    use futures::stream::StreamExt;
    use tpf_ir::pipeline_config::PipelineConfig;

    #[tokio::test]
    async fn fn_step_composes_like_any_other_step() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let steps = vec![unary_step("double", |x: i32| x * 2), identity_step("noop")];
                let config = PipelineConfig::default();
                let telemetry = Rc::new(TelemetryHandle::new(false, Default::default()));
                let input = Flow::Stream(Box::pin(futures::stream::iter(vec![1, 2, 3])));

                let run = run_pipeline(input, &steps, &config, &telemetry)
                    .await
                    .expect("no configuration errors");
                let output: Vec<i32> = run.flow.into_stream().collect().await;
                assert_eq!(output, vec![2, 4, 6]);
            })
            .await;
    }
}
