// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The public entry point (§4.4): `execute_streaming`/`execute_unary`, built on
//! top of [`crate::runner::run_pipeline`].
//!
//! Step instances are shared across runs (§5), so [`ExecutionService::new`]
//! loads and instantiates the ordered step list once, eagerly, rather than on
//! every call — a run's only per-call work is driving the already-built step
//! chain over a fresh input.

use crate::error::RuntimeError;
use crate::health::{HealthGate, HealthState, Probe};
use crate::registry::step_descriptor_map;
use crate::runner::{run_pipeline, PipelineRun, StepHandle};
use crate::step::{Flow, Step};
use crate::telemetry::TelemetryHandle;
use futures::stream::{LocalBoxStream, StreamExt};
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tpf_ir::order::OrderedStepList;
use tpf_ir::pipeline_config::PipelineConfig;
use tpf_ir::step_model::StreamingShape;
use tpf_ir::StepName;

/// Converts one registry factory's type-erased output into a concrete
/// `Rc<dyn Step<T>>`, or `None` if `canonical_name` names a step whose
/// registered type does not implement `Step<T>` for this pipeline's item type.
///
/// Generated binding-construction code supplies this: it is the one place
/// that knows, for a specific generated plugin binary, which concrete step
/// struct each canonical name resolves to.
pub type StepDowncast<T> = Rc<dyn Fn(&str, Box<dyn Any + Send + Sync>) -> Option<Rc<dyn Step<T>>>>;

/// Everything [`ExecutionService::new`] needs to load and instantiate a run's
/// step chain.
pub struct ExecutionServiceConfig<T> {
    /// The canonical ordered-step resource (`order.json`), as loaded at startup.
    pub order: OrderedStepList,
    /// The active profile's runtime tunables.
    pub pipeline_config: PipelineConfig,
    /// Converts a registry factory's output into this pipeline's concrete step type.
    pub downcast: StepDowncast<T>,
    /// Per-step `parallel:` template overrides, keyed by canonical step name.
    pub parallel_overrides: HashMap<String, Option<bool>>,
    /// The startup readiness timeout (`health.startup-timeout`).
    pub startup_timeout: Duration,
}

/// The running process's entry point for driving pipeline calls.
///
/// Cheaply cloneable: cloning shares the same step chain, health gate and
/// telemetry handle, matching "step instances are shared across runs" (§5).
pub struct ExecutionService<T> {
    steps: Rc<Vec<StepHandle<T>>>,
    pipeline_config: Rc<PipelineConfig>,
    health: HealthGate,
    telemetry: Rc<TelemetryHandle>,
    startup_timeout: Duration,
}

impl<T> Clone for ExecutionService<T> {
    fn clone(&self) -> Self {
        Self {
            steps: Rc::clone(&self.steps),
            pipeline_config: Rc::clone(&self.pipeline_config),
            health: self.health.clone(),
            telemetry: Rc::clone(&self.telemetry),
            startup_timeout: self.startup_timeout,
        }
    }
}

impl<T> ExecutionService<T>
where
    T: Clone + 'static,
{
    /// Loads the ordered step list, reconciles it against the link-time
    /// registry, and instantiates every reconciled step. Fails the returned
    /// handle (step 1 of the subscription sequence) if reconciliation or
    /// instantiation fails.
    pub fn new(
        config: ExecutionServiceConfig<T>,
        health: HealthGate,
        telemetry: Rc<TelemetryHandle>,
    ) -> Result<Self, RuntimeError> {
        let steps = load_ordered_steps(
            &config.order,
            &config.downcast,
            &config.parallel_overrides,
        )?;
        Ok(Self {
            steps: Rc::new(steps),
            pipeline_config: Rc::new(config.pipeline_config),
            health,
            telemetry,
            startup_timeout: config.startup_timeout,
        })
    }

    /// Runs every startup probe concurrently, resolving the health gate.
    /// Typically called once at process boot, before serving any calls.
    pub async fn probe_startup(&self, probes: Vec<(StepName, Probe)>) {
        self.health.probe_all(probes, self.startup_timeout).await;
    }

    /// The process-wide health gate, for callers that need to observe or
    /// drive readiness independently of a specific call.
    #[must_use]
    pub fn health_gate(&self) -> &HealthGate {
        &self.health
    }

    async fn await_healthy(&self) -> Result<(), RuntimeError> {
        match self.health.wait_for_resolution(Some(self.startup_timeout)).await {
            HealthState::Healthy => Ok(()),
            HealthState::Pending => Err(RuntimeError::Health {
                details: format!(
                    "startup readiness did not resolve within {:?}",
                    self.startup_timeout
                ),
            }),
            HealthState::Unhealthy => Err(RuntimeError::Health {
                details: "a dependent-service startup probe failed".to_string(),
            }),
            HealthState::Error => Err(RuntimeError::Health {
                details: "the health gate entered ERROR before probing could complete".to_string(),
            }),
        }
    }

    /// `execute_streaming(input) -> lazy sequence of T` (§4.4).
    ///
    /// The returned stream yields `Ok` for every successfully produced item
    /// and, only as its final element, an `Err` if a step ultimately failed
    /// after retries/DLQ recovery were exhausted — matching "propagates and
    /// aborts the run" without giving `Flow<T>`'s plain `Stream<Item = T>` a
    /// built-in error channel (see [`crate::runner::FailureSlot`]). No items
    /// follow an `Err`.
    ///
    /// Cancelling `cancel` stops the stream early with no further emissions,
    /// including no trailing `Err`.
    pub async fn execute_streaming(
        &self,
        input: LocalBoxStream<'static, T>,
        cancel: CancellationToken,
    ) -> Result<LocalBoxStream<'static, Result<T, RuntimeError>>, RuntimeError> {
        self.await_healthy().await?;
        if let Some(first) = self.steps.first() {
            let shape = first.step.streaming_shape();
            if !accepts_stream_input(shape) {
                return Err(RuntimeError::Shape {
                    step: first.canonical_name.clone(),
                    details: "a streaming call was issued against a pipeline whose first step expects a unary input".to_string(),
                });
            }
        }

        self.telemetry.run_begin();
        let run = run_pipeline(Flow::Stream(input), &self.steps, &self.pipeline_config, &self.telemetry).await;
        let telemetry = Rc::clone(&self.telemetry);

        match run {
            Ok(PipelineRun { flow, failure }) => {
                let mut upstream = flow.into_stream().take_until(cancel.cancelled_owned());
                Ok(Box::pin(async_stream::stream! {
                    while let Some(item) = upstream.next().await {
                        yield Ok(item);
                    }
                    match failure.take() {
                        Some(error) => {
                            telemetry.run_end(true);
                            yield Err(error);
                        }
                        None => {
                            telemetry.run_end(false);
                        }
                    }
                }))
            }
            Err(error) => {
                self.telemetry.run_end(true);
                Err(error)
            }
        }
    }

    /// `execute_unary(input) -> deferred single T` (§4.4).
    pub async fn execute_unary(&self, input: T, cancel: CancellationToken) -> Result<T, RuntimeError> {
        self.await_healthy().await?;
        if let Some(first) = self.steps.first() {
            let shape = first.step.streaming_shape();
            if accepts_stream_input(shape) {
                return Err(RuntimeError::Shape {
                    step: first.canonical_name.clone(),
                    details: "a unary call was issued against a pipeline whose first step expects a stream input".to_string(),
                });
            }
        }

        self.telemetry.run_begin();
        if cancel.is_cancelled() {
            self.telemetry.run_end(true);
            return Err(RuntimeError::CancellationRequested);
        }

        let run = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.telemetry.run_end(true);
                return Err(RuntimeError::CancellationRequested);
            }
            run = run_pipeline(Flow::Unary(input), &self.steps, &self.pipeline_config, &self.telemetry) => run,
        };

        let PipelineRun { flow, failure } = match run {
            Ok(run) => run,
            Err(error) => {
                self.telemetry.run_end(true);
                return Err(error);
            }
        };
        if let Some(error) = failure.take() {
            self.telemetry.run_end(true);
            return Err(error);
        }

        let result = match flow {
            Flow::Unary(value) => Ok(value),
            Flow::Stream(mut stream) => {
                let mut last = None;
                let mut count = 0u32;
                while let Some(item) = stream.next().await {
                    count += 1;
                    last = Some(item);
                }
                if count != 1 {
                    Err(RuntimeError::Shape {
                        step: "execute_unary".to_string(),
                        details: format!("the pipeline produced {count} items for a unary call; expected exactly one"),
                    })
                } else {
                    Ok(last.expect("count == 1 implies an item was recorded"))
                }
            }
        };
        self.telemetry.run_end(result.is_err());
        result
    }
}

const fn accepts_stream_input(shape: StreamingShape) -> bool {
    matches!(shape, StreamingShape::StreamInUnaryOut | StreamingShape::StreamInStreamOut)
}

fn load_ordered_steps<T>(
    order: &OrderedStepList,
    downcast: &StepDowncast<T>,
    parallel_overrides: &HashMap<String, Option<bool>>,
) -> Result<Vec<StepHandle<T>>, RuntimeError>
where
    T: 'static,
{
    let registry = step_descriptor_map();
    let registered_names: Vec<StepName> = registry.keys().map(|name| StepName::from(*name)).collect();
    let reconciled = order.reconcile(&registered_names);

    for name in &reconciled.ignored_from_canonical {
        tracing::warn!(step = %name, "canonical step order names a step absent from this binary's registry; dropped");
    }
    for name in &reconciled.unknown_in_runtime {
        tracing::warn!(step = %name, "registry contains a step absent from the canonical order; ignored");
    }

    reconciled
        .order
        .iter()
        .filter(|name| registry.contains_key(name.as_ref()))
        .map(|name| {
            let descriptor = registry[name.as_ref()];
            let instance = (descriptor.factory)();
            let step = downcast(name.as_ref(), instance).ok_or_else(|| RuntimeError::Configuration {
                details: format!("step `{name}`'s registered factory did not produce the expected step type"),
            })?;
            Ok(StepHandle {
                canonical_name: name.to_string(),
                step,
                parallel_override: parallel_overrides.get(name.as_ref()).copied().flatten(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tpf_ir::step_config::StepConfig;

    struct Echo {
        config: StepConfig,
    }

    #[async_trait(?Send)]
    impl Step<i32> for Echo {
        fn streaming_shape(&self) -> StreamingShape {
            StreamingShape::UnaryInUnaryOut
        }

        fn config(&self) -> &StepConfig {
            &self.config
        }

        async fn apply(&self, input: Flow<i32>) -> Result<Flow<i32>, RuntimeError> {
            Ok(input)
        }
    }

    fn handle(name: &str) -> StepHandle<i32> {
        StepHandle {
            canonical_name: name.to_string(),
            step: Rc::new(Echo {
                config: StepConfig::default(),
            }),
            parallel_override: None,
        }
    }

    fn service(health: HealthGate) -> ExecutionService<i32> {
        ExecutionService {
            steps: Rc::new(vec![handle("com.example.Echo")]),
            pipeline_config: Rc::new(PipelineConfig::default()),
            health,
            telemetry: Rc::new(TelemetryHandle::new(true, Default::default())),
            startup_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn execute_unary_fails_fast_while_health_gate_is_unresolved() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let service = service(HealthGate::new());
                let result = service.execute_unary(1, CancellationToken::new()).await;
                assert!(matches!(result, Err(RuntimeError::Health { .. })));
            })
            .await;
    }

    #[tokio::test]
    async fn execute_unary_succeeds_once_healthy() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let health = HealthGate::new();
                health.probe_all(vec![], Duration::from_secs(1)).await;
                let service = service(health);
                let result = service.execute_unary(41, CancellationToken::new()).await;
                assert_eq!(result.expect("healthy run succeeds"), 41);
            })
            .await;
    }

    #[tokio::test]
    async fn execute_unary_observes_pre_cancelled_token() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let health = HealthGate::new();
                health.probe_all(vec![], Duration::from_secs(1)).await;
                let service = service(health);
                let cancel = CancellationToken::new();
                cancel.cancel();
                let result = service.execute_unary(1, cancel).await;
                assert!(matches!(result, Err(RuntimeError::CancellationRequested)));
            })
            .await;
    }

    #[tokio::test]
    async fn execute_streaming_rejects_a_unary_only_pipeline() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let health = HealthGate::new();
                health.probe_all(vec![], Duration::from_secs(1)).await;
                let service = service(health);
                let input: LocalBoxStream<'static, i32> = Box::pin(futures::stream::iter(vec![1, 2]));
                let result = service.execute_streaming(input, CancellationToken::new()).await;
                assert!(matches!(result, Err(RuntimeError::Shape { .. })));
            })
            .await;
    }
}
