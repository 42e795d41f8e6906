// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The pipeline runner (§4.3): shape adaptation, the `resolveParallel` policy,
//! bounded-concurrency fan-out, retry/backoff, backpressure and cache-policy
//! enforcement composed into a single reactive flow.
//!
//! Every flow is driven from within a single-threaded reactive scope (a
//! `tokio::task::LocalSet`); step instances and telemetry are shared via `Rc`,
//! not `Arc`. Bounded concurrency is cooperative (`buffer_unordered`), not
//! OS threads.

use crate::backoff::{apply_jitter, compute_delay};
use crate::cache;
use crate::context;
use crate::error::RuntimeError;
use crate::step::{Flow, Step};
use crate::telemetry::{KillSwitchMode, TelemetryHandle};
use futures::stream::{LocalBoxStream, StreamExt};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;
use tokio::time::sleep;
use tpf_ir::pipeline_config::{Parallelism, PipelineConfig};
use tpf_ir::step_config::{BackpressureStrategy, StepConfig};
use tpf_ir::step_model::{Ordering, ParallelismHints, StreamingShape, ThreadSafety};

/// A step instance together with the identity and override information the
/// runner needs beyond what [`Step`] itself exposes.
pub struct StepHandle<T> {
    /// The step's canonical, fully-qualified name, as it appears in `order.json`
    /// and in per-step config overrides.
    pub canonical_name: String,
    /// The step instance applied to each item or whole flow.
    pub step: Rc<dyn Step<T>>,
    /// The template's per-step `parallel:` flag, if declared; takes precedence
    /// over the profile's `PipelineConfig::parallelism` for this step only.
    pub parallel_override: Option<bool>,
}

impl<T> Clone for StepHandle<T> {
    fn clone(&self) -> Self {
        Self {
            canonical_name: self.canonical_name.clone(),
            step: Rc::clone(&self.step),
            parallel_override: self.parallel_override,
        }
    }
}

/// The outcome of `resolveParallel` for a single step application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedParallelism {
    /// Items are applied one at a time, in arrival order.
    Sequential,
    /// Items are applied with bounded concurrency up to `max_concurrency`.
    Parallel,
}

/// Decides whether `step` runs sequentially or in parallel, per the six-rule
/// `resolveParallel` policy:
///
/// 1. `UNSAFE` thread-safety with a non-`SEQUENTIAL` effective policy is a fatal
///    configuration error.
/// 2. `STRICT_REQUIRED` ordering with a non-`SEQUENTIAL` effective policy is a
///    fatal configuration error.
/// 3. An effective policy of `SEQUENTIAL` always runs sequentially.
/// 4. `STRICT_ADVISED` ordering runs sequentially under `AUTO` (logged as
///    advisory) but honors an explicit `PARALLEL` policy (logged as an
///    override).
/// 5. An effective policy of `PARALLEL` always runs in parallel.
/// 6. Otherwise (`AUTO`), runs in parallel iff the step's shape is an
///    auto-parallel candidate (`UNARY_IN_STREAM_OUT`).
///
/// `step_override` is the template's per-step `parallel:` flag; when present it
/// replaces `policy` entirely for this step (Open Question 3, resolved; see
/// `DESIGN.md`).
pub fn resolve_parallel(
    step: &str,
    hints: ParallelismHints,
    policy: Parallelism,
    shape: StreamingShape,
    step_override: Option<bool>,
) -> Result<ResolvedParallelism, RuntimeError> {
    let effective_policy = match step_override {
        Some(true) => Parallelism::Parallel,
        Some(false) => Parallelism::Sequential,
        None => policy,
    };

    if hints.thread_safety == ThreadSafety::Unsafe && effective_policy != Parallelism::Sequential {
        return Err(RuntimeError::Configuration {
            details: format!(
                "step `{step}` declares UNSAFE thread-safety but its effective parallelism policy is not SEQUENTIAL"
            ),
        });
    }
    if hints.ordering == Ordering::StrictRequired && effective_policy != Parallelism::Sequential {
        return Err(RuntimeError::Configuration {
            details: format!(
                "step `{step}` declares STRICT_REQUIRED ordering but its effective parallelism policy is not SEQUENTIAL"
            ),
        });
    }
    if effective_policy == Parallelism::Sequential {
        return Ok(ResolvedParallelism::Sequential);
    }
    if hints.ordering == Ordering::StrictAdvised {
        return Ok(if effective_policy == Parallelism::Auto {
            tracing::warn!(step, "STRICT_ADVISED ordering with AUTO policy; running sequentially");
            ResolvedParallelism::Sequential
        } else {
            tracing::warn!(step, "STRICT_ADVISED ordering overridden by an explicit PARALLEL policy");
            ResolvedParallelism::Parallel
        });
    }
    if effective_policy == Parallelism::Parallel {
        return Ok(ResolvedParallelism::Parallel);
    }
    Ok(if shape.is_auto_parallel_candidate() {
        ResolvedParallelism::Parallel
    } else {
        ResolvedParallelism::Sequential
    })
}

/// A run-scoped slot a lazily-consumed fan-out stream uses to report the first
/// fatal per-item failure it observed.
///
/// `futures::Stream<Item = T>` has no built-in error channel, so a fan-out
/// combinator cannot propagate a mid-stream failure through its own item type
/// without changing every step's `Flow<T>` to `Flow<Result<T, RuntimeError>>`.
/// Instead, the combinator records the failure here and stops yielding further
/// items; callers that fully drain a flow (a stream-input step consuming its
/// upstream, or the execution service's terminal subscriber) must consult
/// [`FailureSlot::take`] afterward and prefer it over a nominally-successful
/// result, since early termination means the drained item count is short.
#[derive(Clone, Default)]
pub struct FailureSlot(Rc<RefCell<Option<RuntimeError>>>);

impl FailureSlot {
    /// Builds an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error`, if no failure has been recorded yet. The first failure wins.
    pub fn record(&self, error: RuntimeError) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Takes the recorded failure, if any, clearing the slot.
    pub fn take(&self) -> Option<RuntimeError> {
        self.0.borrow_mut().take()
    }
}

/// The result of driving an ordered step list over one input flow.
pub struct PipelineRun<T> {
    /// The final flow, possibly still lazy (unconsumed).
    pub flow: Flow<T>,
    /// The shared failure slot any fan-out stage within this run reports into.
    pub failure: FailureSlot,
}

/// Applies `steps`, in order, to `input`, producing the composed flow.
///
/// Per the ordering contract (§4.1.6), `steps` must already be in the
/// reconciled canonical order; this function performs no further reordering.
pub async fn run_pipeline<T>(
    input: Flow<T>,
    steps: &[StepHandle<T>],
    pipeline_config: &PipelineConfig,
    telemetry: &Rc<TelemetryHandle>,
) -> Result<PipelineRun<T>, RuntimeError>
where
    T: Clone + 'static,
{
    let failure = FailureSlot::new();
    let mut flow = input;
    for handle in steps {
        flow = apply_step(flow, handle, pipeline_config, telemetry, &failure).await?;
    }
    Ok(PipelineRun { flow, failure })
}

async fn apply_step<T>(
    flow: Flow<T>,
    handle: &StepHandle<T>,
    pipeline_config: &PipelineConfig,
    telemetry: &Rc<TelemetryHandle>,
    failure: &FailureSlot,
) -> Result<Flow<T>, RuntimeError>
where
    T: Clone + 'static,
{
    let shape = handle.step.streaming_shape();
    let is_unary_input = matches!(
        shape,
        StreamingShape::UnaryInUnaryOut | StreamingShape::UnaryInStreamOut | StreamingShape::SideEffect
    );
    let step_config = pipeline_config.effective_step_config(&handle.canonical_name);

    match (flow, is_unary_input) {
        (Flow::Unary(item), true) => match apply_single_item(item, handle, &step_config, telemetry).await? {
            Some(flow) => Ok(flow),
            None => Ok(Flow::Stream(Box::pin(futures::stream::empty()))),
        },
        (Flow::Stream(stream), true) => {
            let resolved = resolve_parallel(
                &handle.canonical_name,
                handle.step.parallelism_hints(),
                pipeline_config.parallelism,
                shape,
                handle.parallel_override,
            )?;
            Ok(Flow::Stream(fan_out_stream(
                stream,
                handle.clone(),
                step_config,
                resolved,
                pipeline_config.effective_max_concurrency(),
                Rc::clone(telemetry),
                failure.clone(),
            )))
        }
        (Flow::Unary(item), false) => {
            let one_element = Flow::Unary(item).into_stream();
            let result = handle.step.apply(Flow::Stream(one_element)).await?;
            match failure.take() {
                Some(error) => Err(error),
                None => Ok(result),
            }
        }
        (Flow::Stream(stream), false) => {
            let result = handle.step.apply(Flow::Stream(stream)).await?;
            match failure.take() {
                Some(error) => Err(error),
                None => Ok(result),
            }
        }
    }
}

/// Applies a unary-input step to a single item: retry/backoff, the
/// retry-amplification kill-switch, DLQ recovery, and — for
/// `UNARY_IN_UNARY_OUT` steps only — cache-policy enforcement on the returned
/// value. Returns `Ok(None)` when the item was dropped (a `CACHE_ONLY` miss, or
/// an unrecovered failure under `recover_on_failure` with no DLQ substitute).
async fn apply_single_item<T>(
    item: T,
    handle: &StepHandle<T>,
    config: &StepConfig,
    telemetry: &Rc<TelemetryHandle>,
) -> Result<Option<Flow<T>>, RuntimeError>
where
    T: Clone + 'static,
{
    let shape = handle.step.streaming_shape();
    match apply_with_retry(item, handle, config, telemetry).await? {
        None => Ok(None),
        Some(Flow::Unary(value)) if shape == StreamingShape::UnaryInUnaryOut => {
            let status = context::take_cache_status();
            let policy = context::try_current()
                .map(|ctx| ctx.effective_cache_policy())
                .unwrap_or_default();
            match cache::enforce(policy, value, status, None)? {
                cache::Enforced::Emit(value) => Ok(Some(Flow::Unary(value))),
                cache::Enforced::Drop => Ok(None),
            }
        }
        Some(other) => Ok(Some(other)),
    }
}

async fn apply_with_retry<T>(
    item: T,
    handle: &StepHandle<T>,
    config: &StepConfig,
    telemetry: &Rc<TelemetryHandle>,
) -> Result<Option<Flow<T>>, RuntimeError>
where
    T: Clone + 'static,
{
    let retry_limit = config.retry_limit.max(1);
    telemetry.adjust_in_flight(&handle.canonical_name, 1);
    telemetry.record_item_consumed(&handle.canonical_name);
    let started = Instant::now();
    let mut attempt = 0u32;
    let mut last_details = String::new();

    loop {
        attempt += 1;
        match handle.step.apply(Flow::Unary(item.clone())).await {
            Ok(flow) => {
                telemetry.adjust_in_flight(&handle.canonical_name, -1);
                telemetry.record_step_duration(&handle.canonical_name, started.elapsed());
                telemetry.record_item_produced(&handle.canonical_name, true);
                return Ok(Some(flow));
            }
            Err(error) => {
                last_details = error.to_string();
                if attempt >= retry_limit {
                    break;
                }
                telemetry.record_retry(&handle.canonical_name);
                if let Some((slope, rate, mode)) = telemetry.check_kill_switch(&handle.canonical_name) {
                    match mode {
                        KillSwitchMode::FailFast => {
                            telemetry.adjust_in_flight(&handle.canonical_name, -1);
                            return Err(RuntimeError::KillSwitchTriggered {
                                step: handle.canonical_name.clone(),
                                observed_slope: slope,
                                observed_retry_rate: rate,
                                window: telemetry.kill_switch_window(),
                            });
                        }
                        KillSwitchMode::LogOnly => {
                            tracing::warn!(
                                step = %handle.canonical_name,
                                slope,
                                rate,
                                "retry-amplification guard thresholds exceeded (log-only)"
                            );
                        }
                    }
                }
                let delay = apply_jitter(
                    compute_delay(attempt, config.retry_wait, config.max_backoff),
                    config.jitter,
                );
                sleep(delay).await;
            }
        }
    }

    telemetry.adjust_in_flight(&handle.canonical_name, -1);
    telemetry.record_item_produced(&handle.canonical_name, false);
    let failure = RuntimeError::StepFailure {
        step: handle.canonical_name.clone(),
        details: last_details,
        attempts: attempt,
    };

    if config.recover_on_failure {
        return match handle.step.recover(&item, &failure) {
            Some(substitute) => Ok(Some(Flow::Unary(substitute))),
            None => {
                tracing::warn!(
                    step = %handle.canonical_name,
                    "recover_on_failure set but no DLQ substitute produced; dropping item"
                );
                Ok(None)
            }
        };
    }
    Err(failure)
}

/// Fans a stream out per element against a unary-input step, per the resolved
/// parallelism policy. Buffers between the upstream source and per-item
/// processing through a `tpf_channel::mpsc` channel sized to the step's
/// `backpressure_buffer_capacity`, realizing BUFFER (suspend on full) and DROP
/// (discard on full) exactly.
fn fan_out_stream<T>(
    upstream: LocalBoxStream<'static, T>,
    handle: StepHandle<T>,
    step_config: StepConfig,
    resolved: ResolvedParallelism,
    max_concurrency: usize,
    telemetry: Rc<TelemetryHandle>,
    failure: FailureSlot,
) -> LocalBoxStream<'static, T>
where
    T: Clone + 'static,
{
    let (sender, receiver) = tpf_channel::mpsc::Channel::new(step_config.backpressure_buffer_capacity.max(1));
    let depth = Rc::new(Cell::new(0i64));
    let strategy = step_config.backpressure_strategy;
    let step_name = handle.canonical_name.clone();

    let _ = tokio::task::spawn_local(drive_producer(
        upstream,
        sender,
        strategy,
        step_name,
        Rc::clone(&telemetry),
        Rc::clone(&depth),
    ));

    let items = receiver_stream(receiver, depth);

    let processed: LocalBoxStream<'static, Option<Flow<T>>> = match resolved {
        ResolvedParallelism::Sequential => Box::pin(items.then(make_processor(
            handle,
            step_config,
            Rc::clone(&telemetry),
            failure,
        ))),
        ResolvedParallelism::Parallel => Box::pin(
            items
                .map(make_processor(handle, step_config, Rc::clone(&telemetry), failure))
                .buffer_unordered(max_concurrency.max(1)),
        ),
    };

    flatten_flows(processed)
}

async fn drive_producer<T: 'static>(
    mut upstream: LocalBoxStream<'static, T>,
    sender: tpf_channel::mpsc::Sender<T>,
    strategy: BackpressureStrategy,
    step_name: String,
    telemetry: Rc<TelemetryHandle>,
    depth: Rc<Cell<i64>>,
) {
    while let Some(item) = upstream.next().await {
        match strategy {
            BackpressureStrategy::Buffer => {
                if sender.send_async(item).await.is_err() {
                    break;
                }
                depth.set(depth.get() + 1);
            }
            BackpressureStrategy::Drop => match sender.send(item) {
                Ok(()) => depth.set(depth.get() + 1),
                Err(tpf_channel::error::SendError::Full(_)) => {
                    tracing::debug!(step = %step_name, "DROP backpressure: discarding item, buffer full");
                }
                Err(tpf_channel::error::SendError::Closed(_)) => break,
            },
        }
        telemetry.record_backpressure_depth(&step_name, depth.get());
    }
    sender.close();
}

fn receiver_stream<T: 'static>(
    receiver: tpf_channel::mpsc::Receiver<T>,
    depth: Rc<Cell<i64>>,
) -> LocalBoxStream<'static, T> {
    Box::pin(async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(item) => {
                    depth.set((depth.get() - 1).max(0));
                    yield item;
                }
                Err(_) => break,
            }
        }
    })
}

fn make_processor<T>(
    handle: StepHandle<T>,
    config: StepConfig,
    telemetry: Rc<TelemetryHandle>,
    failure: FailureSlot,
) -> impl FnMut(T) -> Pin<Box<dyn Future<Output = Option<Flow<T>>>>>
where
    T: Clone + 'static,
{
    move |item: T| {
        let handle = handle.clone();
        let config = config.clone();
        let telemetry = Rc::clone(&telemetry);
        let failure = failure.clone();
        Box::pin(async move {
            match apply_single_item(item, &handle, &config, &telemetry).await {
                Ok(opt) => opt,
                Err(error) => {
                    failure.record(error);
                    None
                }
            }
        })
    }
}

fn flatten_flows<T: 'static>(mut stream: LocalBoxStream<'static, Option<Flow<T>>>) -> LocalBoxStream<'static, T> {
    Box::pin(async_stream::stream! {
        while let Some(item) = stream.next().await {
            match item {
                Some(Flow::Unary(value)) => yield value,
                Some(Flow::Stream(mut inner)) => {
                    while let Some(value) = inner.next().await {
                        yield value;
                    }
                }
                None => {}
            }
        }
    })
}
