// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Run/step/item counters, in-flight gauges, and the retry-amplification
//! kill-switch (§4.7).
//!
//! Metric names are transport-independent and stable; no concrete metrics
//! backend is prescribed (see spec Non-goals). Counters live in-process and
//! are also emitted as `tracing` events so a host can wire an exporter by
//! subscribing to the `tracing` layer.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How the retry-amplification guard reacts when its thresholds are exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSwitchMode {
    /// Abort the run, surfacing `RuntimeError::KillSwitchTriggered`.
    FailFast,
    /// Emit a warning only; the run continues.
    LogOnly,
}

/// Configuration for the retry-amplification guard.
#[derive(Debug, Clone, Copy)]
pub struct KillSwitchConfig {
    /// Whether the guard is active at all.
    pub enabled: bool,
    /// The rolling window the slope/rate are computed over.
    pub window: Duration,
    /// The in-flight slope (items/sec) above which the guard considers tripping.
    pub inflight_slope_threshold: f64,
    /// The retry rate (retries/sec) above which the guard considers tripping.
    pub retry_rate_threshold: f64,
    /// What happens once both thresholds are exceeded.
    pub mode: KillSwitchMode,
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(30),
            inflight_slope_threshold: 50.0,
            retry_rate_threshold: 10.0,
            mode: KillSwitchMode::FailFast,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    inflight: i64,
    retries: u64,
}

/// Per-step rolling window of in-flight/retry samples, used to compute the
/// observed slope and rate the kill-switch evaluates against its thresholds.
struct RollingWindow {
    samples: VecDeque<Sample>,
}

impl RollingWindow {
    fn new() -> Self {
        Self {
            samples: VecDeque::new(),
        }
    }

    fn record(&mut self, window: Duration, inflight: i64, retries: u64) {
        let now = Instant::now();
        self.samples.push_back(Sample {
            at: now,
            inflight,
            retries,
        });
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.at) > window {
                let _ = self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// `(inflight_slope, retry_rate)` observed over the retained window.
    fn observed(&self) -> (f64, f64) {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return (0.0, 0.0);
        };
        let elapsed = last.at.duration_since(first.at).as_secs_f64().max(0.001);
        let inflight_slope = (last.inflight - first.inflight) as f64 / elapsed;
        let retries_delta = last.retries.saturating_sub(first.retries);
        let retry_rate = retries_delta as f64 / elapsed;
        (inflight_slope, retry_rate)
    }
}

#[derive(Default)]
struct StepCounters {
    duration_ns_total: AtomicU64,
    invocations: AtomicU64,
    retries: AtomicU64,
    in_flight: AtomicI64,
    backpressure_depth: AtomicI64,
    backpressure_depth_peak: AtomicI64,
    items_consumed: AtomicU64,
    items_produced: AtomicU64,
    items_succeeded: AtomicU64,
}

/// Per-run counters and the kill-switch guard, shared across a single run's
/// step applications. Cheaply cloneable (internally `Arc`-free; callers wrap
/// it in an `Arc` if they need to share it across spawned tasks).
pub struct TelemetryHandle {
    enabled: bool,
    run_started_at: Mutex<Option<Instant>>,
    steps: Mutex<HashMap<String, StepCounters>>,
    windows: Mutex<HashMap<String, RollingWindow>>,
    kill_switch: KillSwitchConfig,
}

impl TelemetryHandle {
    /// Builds a handle. When `enabled` is false every recording call is a
    /// no-op (matching `telemetry.enabled=false`).
    #[must_use]
    pub fn new(enabled: bool, kill_switch: KillSwitchConfig) -> Self {
        Self {
            enabled,
            run_started_at: Mutex::new(None),
            steps: Mutex::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            kill_switch,
        }
    }

    /// Records the start of a run.
    pub fn run_begin(&self) {
        if !self.enabled {
            return;
        }
        *self.run_started_at.lock() = Some(Instant::now());
        tracing::info!("pipeline run started");
    }

    /// Records the completion of a run, returning the elapsed time.
    pub fn run_end(&self, failed: bool) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let started = self.run_started_at.lock().take()?;
        let elapsed = started.elapsed();
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, failed, "pipeline run finished");
        Some(elapsed)
    }

    fn with_step<R>(&self, step: &str, f: impl FnOnce(&StepCounters) -> R) -> R {
        let mut steps = self.steps.lock();
        let counters = steps.entry(step.to_string()).or_default();
        f(counters)
    }

    /// Records a single step invocation's wall-clock duration.
    pub fn record_step_duration(&self, step: &str, duration: Duration) {
        if !self.enabled {
            return;
        }
        self.with_step(step, |c| {
            c.duration_ns_total
                .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
            let _ = c.invocations.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Records one retry attempt for `step`, feeding the kill-switch's
    /// rolling window.
    pub fn record_retry(&self, step: &str) {
        if !self.enabled {
            return;
        }
        let retries = self.with_step(step, |c| c.retries.fetch_add(1, Ordering::Relaxed) + 1);
        let in_flight = self.with_step(step, |c| c.in_flight.load(Ordering::Relaxed));
        self.sample_window(step, in_flight, retries);
    }

    /// Adjusts the in-flight gauge for `step` by `delta` (+1 on start, -1 on completion).
    pub fn adjust_in_flight(&self, step: &str, delta: i64) {
        if !self.enabled {
            return;
        }
        let in_flight = self.with_step(step, |c| c.in_flight.fetch_add(delta, Ordering::Relaxed) + delta);
        let retries = self.with_step(step, |c| c.retries.load(Ordering::Relaxed));
        self.sample_window(step, in_flight, retries);
    }

    /// Records the current depth of a step's backpressure buffer, tracking
    /// the high-water mark alongside it so callers can verify the
    /// `backpressure_buffer_capacity` bound was honored over a whole run.
    pub fn record_backpressure_depth(&self, step: &str, depth: i64) {
        if !self.enabled {
            return;
        }
        self.with_step(step, |c| {
            c.backpressure_depth.store(depth, Ordering::Relaxed);
            let _ = c.backpressure_depth_peak.fetch_max(depth, Ordering::Relaxed);
        });
    }

    /// The highest backpressure-buffer depth observed for `step` so far, for
    /// verifying the BUFFER strategy never exceeded its configured capacity.
    #[must_use]
    pub fn peak_backpressure_depth(&self, step: &str) -> i64 {
        self.with_step(step, |c| c.backpressure_depth_peak.load(Ordering::Relaxed))
    }

    /// Records one item consumed by a step.
    pub fn record_item_consumed(&self, step: &str) {
        if !self.enabled {
            return;
        }
        self.with_step(step, |c| {
            let _ = c.items_consumed.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Records one item produced by a step, and whether it succeeded (for the
    /// item-success SLO total).
    pub fn record_item_produced(&self, step: &str, succeeded: bool) {
        if !self.enabled {
            return;
        }
        self.with_step(step, |c| {
            let _ = c.items_produced.fetch_add(1, Ordering::Relaxed);
            if succeeded {
                let _ = c.items_succeeded.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    fn sample_window(&self, step: &str, in_flight: i64, retries: u64) {
        let mut windows = self.windows.lock();
        let window = windows.entry(step.to_string()).or_insert_with(RollingWindow::new);
        window.record(self.kill_switch.window, in_flight, retries);
    }

    /// Evaluates the retry-amplification guard for `step`. Returns `Some`
    /// with the observed `(slope, rate)` if both thresholds are exceeded and
    /// the guard is enabled; `fail-fast` mode should abort the run on
    /// `Some`, `log-only` mode should only warn (the caller decides, since
    /// only it knows whether to surface a fatal error).
    #[must_use]
    pub fn check_kill_switch(&self, step: &str) -> Option<(f64, f64, KillSwitchMode)> {
        if !self.enabled || !self.kill_switch.enabled {
            return None;
        }
        let windows = self.windows.lock();
        let (slope, rate) = windows.get(step)?.observed();
        if slope > self.kill_switch.inflight_slope_threshold
            && rate > self.kill_switch.retry_rate_threshold
        {
            Some((slope, rate, self.kill_switch.mode))
        } else {
            None
        }
    }

    /// The configured rolling window, for error reporting.
    #[must_use]
    pub fn kill_switch_window(&self) -> Duration {
        self.kill_switch.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_handle_records_nothing() {
        let telemetry = TelemetryHandle::new(false, KillSwitchConfig::default());
        telemetry.record_retry("step-a");
        assert!(telemetry.check_kill_switch("step-a").is_none());
    }

    #[test]
    fn kill_switch_trips_when_both_thresholds_exceeded() {
        let config = KillSwitchConfig {
            inflight_slope_threshold: 0.0,
            retry_rate_threshold: 0.0,
            window: Duration::from_secs(30),
            ..KillSwitchConfig::default()
        };
        let telemetry = TelemetryHandle::new(true, config);
        telemetry.adjust_in_flight("step-a", 1);
        telemetry.record_retry("step-a");
        std::thread::sleep(Duration::from_millis(5));
        telemetry.adjust_in_flight("step-a", 10);
        telemetry.record_retry("step-a");
        assert!(telemetry.check_kill_switch("step-a").is_some());
    }

    #[test]
    fn kill_switch_does_not_trip_below_thresholds() {
        let telemetry = TelemetryHandle::new(true, KillSwitchConfig::default());
        telemetry.adjust_in_flight("step-a", 1);
        telemetry.record_retry("step-a");
        assert!(telemetry.check_kill_switch("step-a").is_none());
    }

    #[test]
    fn run_begin_end_reports_elapsed() {
        let telemetry = TelemetryHandle::new(true, KillSwitchConfig::default());
        telemetry.run_begin();
        std::thread::sleep(Duration::from_millis(2));
        let elapsed = telemetry.run_end(false).expect("run was started");
        assert!(elapsed.as_millis() >= 1);
    }
}
