// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Hosts a running [`ExecutionService`] on a dedicated OS thread via
//! [`crate::thread_task`], exposing a cross-thread status view and graceful
//! shutdown.
//!
//! `ExecutionService<T>`'s step chain is built from the link-time registry
//! plus a caller-supplied downcast from a specific generated binary (see
//! `tpf_runtime::execution_service`'s doc comment); this module only knows
//! how to run whatever `T` and `config_factory` it is handed. The `tpf`
//! binary's own `serve` subcommand instantiates this with `T =
//! serde_json::Value` as a local dry-run harness for pipelines whose steps
//! are JSON-shaped, ahead of plugging in generated transport servers.

use crate::error::Error;
use crate::observed_state::ServiceState;
use crate::thread_task::{spawn_thread_local_task, ThreadLocalTaskHandle};
use std::rc::Rc;
use tpf_runtime::execution_service::{ExecutionService, ExecutionServiceConfig};
use tpf_runtime::health::{HealthGate, Probe};
use tpf_runtime::telemetry::{KillSwitchConfig, TelemetryHandle};
use tpf_ir::StepName;

/// A running pipeline service, hosted on its own thread.
pub struct PipelineServiceHandle {
    app_name: String,
    step_count: usize,
    health: HealthGate,
    task: ThreadLocalTaskHandle<(), Error>,
}

impl PipelineServiceHandle {
    /// Builds the step chain inside a dedicated thread (via `config_factory`,
    /// since `ExecutionServiceConfig` is not `Send`), probes startup
    /// readiness, then idles until shutdown is requested.
    pub fn spawn<T, F>(
        thread_name: impl Into<String>,
        app_name: String,
        step_count: usize,
        startup_probes: Vec<(StepName, Probe)>,
        config_factory: F,
    ) -> Result<Self, Error>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<ExecutionServiceConfig<T>, Error> + Send + 'static,
    {
        let health = HealthGate::new();
        let health_for_task = health.clone();

        let task = spawn_thread_local_task(thread_name, move |cancel_token| async move {
            let telemetry = Rc::new(TelemetryHandle::new(true, KillSwitchConfig::default()));
            let config = config_factory()?;
            let service = ExecutionService::new(config, health_for_task.clone(), telemetry)?;
            service.probe_startup(startup_probes).await;
            cancel_token.cancelled().await;
            Ok(())
        })?;

        Ok(Self {
            app_name,
            step_count,
            health,
            task,
        })
    }

    /// A point-in-time snapshot of this service's observed state.
    #[must_use]
    pub fn status(&self) -> ServiceState {
        ServiceState::new(self.app_name.clone(), self.health.current(), self.step_count)
    }

    /// Requests shutdown and waits for the hosting thread to exit.
    pub fn shutdown_and_join(self) -> Result<(), Error> {
        self.task.shutdown_and_join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::time::Duration;
    use tpf_ir::order::OrderedStepList;
    use tpf_ir::pipeline_config::PipelineConfig;
    use tpf_ir::step_config::StepConfig;
    use tpf_ir::step_model::StreamingShape;
    use tpf_runtime::error::RuntimeError;
    use tpf_runtime::step::{Flow, Step};

    struct PassThrough {
        config: StepConfig,
    }

    #[async_trait(?Send)]
    impl Step<Value> for PassThrough {
        fn streaming_shape(&self) -> StreamingShape {
            StreamingShape::UnaryInUnaryOut
        }

        fn config(&self) -> &StepConfig {
            &self.config
        }

        async fn apply(&self, input: Flow<Value>) -> Result<Flow<Value>, RuntimeError> {
            Ok(input)
        }
    }

    fn empty_config() -> ExecutionServiceConfig<Value> {
        ExecutionServiceConfig {
            order: OrderedStepList::new(vec![]),
            pipeline_config: PipelineConfig::default(),
            downcast: Rc::new(|_name, instance| {
                instance
                    .downcast::<PassThrough>()
                    .ok()
                    .map(|step| Rc::new(*step) as Rc<dyn Step<Value>>)
            }),
            parallel_overrides: HashMap::new(),
            startup_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn spawns_an_empty_pipeline_and_reaches_healthy() {
        let handle = PipelineServiceHandle::spawn(
            "tpf-service-test",
            "orders".to_string(),
            0,
            vec![],
            move || Ok(empty_config()),
        )
        .expect("spawns");

        std::thread::sleep(Duration::from_millis(50));
        let status = handle.status();
        assert_eq!(status.app_name, "orders");
        handle.shutdown_and_join().expect("shuts down cleanly");
    }
}
