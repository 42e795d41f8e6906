// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The startup readiness state machine (§4.6).
//!
//! One [`HealthGate`] is owned per run process. It probes dependent services
//! discovered from step metadata before a run is allowed to start, and is
//! sticky once it reaches a terminal state (`HEALTHY`/`UNHEALTHY`/`ERROR`).

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tpf_ir::StepName;

/// The default startup timeout (`health.startup-timeout`), applied when the
/// caller does not supply one.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The readiness state of a run process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    /// Initial state: probing has not yet concluded.
    Pending,
    /// All dependent-service probes succeeded within the startup timeout.
    Healthy,
    /// At least one probe finally failed within the startup timeout.
    Unhealthy,
    /// Probing itself threw (e.g. a step failed to instantiate).
    Error,
}

impl HealthState {
    /// Whether this state is terminal (sticky) within the process.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, HealthState::Pending)
    }

    /// Whether a run may start while the gate is in this state.
    #[must_use]
    pub const fn permits_run(self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

/// A single dependent-service readiness probe, keyed by the step that requires it.
pub type Probe = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// The startup readiness gate. Cheaply cloneable; every clone observes the
/// same underlying state.
#[derive(Clone)]
pub struct HealthGate {
    state: watch::Sender<HealthState>,
}

impl HealthGate {
    /// Builds a gate in the initial `PENDING` state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(HealthState::Pending);
        Self { state }
    }

    /// The current state, without waiting.
    #[must_use]
    pub fn current(&self) -> HealthState {
        *self.state.borrow()
    }

    /// Runs every probe to completion (all concurrently), transitioning the
    /// gate to its terminal state and returning it.
    ///
    /// Per §4.6: an empty `probes` list skips probing entirely and moves
    /// directly to `HEALTHY`. A per-probe failure (the probe future resolving
    /// to `Err`, naming which dependency failed) moves the gate to
    /// `UNHEALTHY`; a panic or logic error in the probing harness itself
    /// would be `ERROR`, surfaced here when the harness's own setup — not a
    /// probe — fails (see [`HealthGate::fail`]).
    pub async fn probe_all(&self, probes: Vec<(StepName, Probe)>, startup_timeout: Duration) {
        if self.current().is_terminal() {
            return;
        }
        if probes.is_empty() {
            self.transition(HealthState::Healthy);
            return;
        }

        let result = timeout(startup_timeout, async {
            let futures = probes.into_iter().map(|(name, probe)| async move {
                probe().await.map_err(|details| (name, details))
            });
            futures::future::join_all(futures).await
        })
        .await;

        match result {
            Ok(results) => {
                let failures: Vec<(StepName, String)> = results.into_iter().filter_map(Result::err).collect();
                if failures.is_empty() {
                    self.transition(HealthState::Healthy);
                } else {
                    for (name, details) in &failures {
                        tracing::warn!(probe = %name, details = %details, "startup probe failed");
                    }
                    self.transition(HealthState::Unhealthy);
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = startup_timeout.as_secs(),
                    "startup probes did not complete within the configured timeout"
                );
                self.transition(HealthState::Unhealthy);
            }
        }
    }

    /// Moves the gate directly to `ERROR`, for use when probing itself cannot
    /// be attempted (e.g. a step failed to instantiate before its probe could
    /// even be built).
    pub fn fail(&self, details: &str) {
        tracing::error!(details, "health gate entered ERROR before probing could run");
        self.transition(HealthState::Error);
    }

    /// Waits for the gate to leave `PENDING`, optionally bounded by
    /// `caller_timeout`. Returns the resolved state, or `PENDING` if
    /// `caller_timeout` elapses first.
    pub async fn wait_for_resolution(&self, caller_timeout: Option<Duration>) -> HealthState {
        let mut receiver = self.state.subscribe();
        if receiver.borrow().is_terminal() {
            return *receiver.borrow();
        }
        let wait = async {
            loop {
                if receiver.changed().await.is_err() {
                    return HealthState::Error;
                }
                let state = *receiver.borrow();
                if state.is_terminal() {
                    return state;
                }
            }
        };
        match caller_timeout {
            Some(duration) => timeout(duration, wait).await.unwrap_or(HealthState::Pending),
            None => wait.await,
        }
    }

    fn transition(&self, next: HealthState) {
        if !self.current().is_terminal() {
            let _ = self.state.send(next);
        }
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_probe() -> Probe {
        Arc::new(|| Box::pin(async { Ok(()) }))
    }

    fn failing_probe(details: &'static str) -> Probe {
        Arc::new(move || Box::pin(async move { Err(details.to_string()) }))
    }

    #[tokio::test]
    async fn empty_probe_list_moves_straight_to_healthy() {
        let gate = HealthGate::new();
        gate.probe_all(vec![], DEFAULT_STARTUP_TIMEOUT).await;
        assert_eq!(gate.current(), HealthState::Healthy);
    }

    #[tokio::test]
    async fn all_probes_succeeding_moves_to_healthy() {
        let gate = HealthGate::new();
        gate.probe_all(
            vec![("a".into(), ok_probe()), ("b".into(), ok_probe())],
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(gate.current(), HealthState::Healthy);
    }

    #[tokio::test]
    async fn any_probe_failing_moves_to_unhealthy() {
        let gate = HealthGate::new();
        gate.probe_all(
            vec![("a".into(), ok_probe()), ("b".into(), failing_probe("down"))],
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(gate.current(), HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn terminal_states_are_sticky() {
        let gate = HealthGate::new();
        gate.fail("boom");
        assert_eq!(gate.current(), HealthState::Error);
        gate.probe_all(vec![], DEFAULT_STARTUP_TIMEOUT).await;
        assert_eq!(gate.current(), HealthState::Error);
    }

    #[tokio::test]
    async fn wait_for_resolution_observes_transition() {
        let gate = HealthGate::new();
        let waiter = gate.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_resolution(None).await });
        gate.probe_all(vec![], DEFAULT_STARTUP_TIMEOUT).await;
        assert_eq!(handle.await.expect("probe task"), HealthState::Healthy);
    }

    #[tokio::test]
    async fn wait_for_resolution_times_out_while_pending() {
        let gate = HealthGate::new();
        let state = gate
            .wait_for_resolution(Some(Duration::from_millis(10)))
            .await;
        assert_eq!(state, HealthState::Pending);
    }
}
