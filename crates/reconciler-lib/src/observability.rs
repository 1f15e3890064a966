//! Observability infrastructure for the reconciler
//!
//! Provides:
//! - Prometheus metrics (cycle latency, tier populations, enforcement counters)
//! - Structured JSON logging with tracing

use crate::models::{ContainerRecord, Tier};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle latency (in seconds). Cycles shell out to the
/// container runtime, so the range reaches well past one second.
const CYCLE_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ReconcilerMetricsInner> = OnceLock::new();

struct ReconcilerMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles_completed: IntCounter,
    cycles_aborted: IntCounter,
    containers_observed: IntGauge,
    tier_population: IntGaugeVec,
    terminations: IntCounterVec,
    creation_requests: IntCounter,
    store_write_errors: IntCounter,
    external_command_errors: IntCounter,
}

impl ReconcilerMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "reconciler_cycle_latency_seconds",
                "Time spent on one reconciliation cycle",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles_completed: register_int_counter!(
                "reconciler_cycles_completed_total",
                "Reconciliation cycles that ran to completion"
            )
            .expect("Failed to register cycles_completed"),

            cycles_aborted: register_int_counter!(
                "reconciler_cycles_aborted_total",
                "Reconciliation cycles abandoned because telemetry was unavailable"
            )
            .expect("Failed to register cycles_aborted"),

            containers_observed: register_int_gauge!(
                "reconciler_containers_observed",
                "Containers reported by the latest container snapshot"
            )
            .expect("Failed to register containers_observed"),

            tier_population: register_int_gauge_vec!(
                "reconciler_tier_population",
                "Containers classified into each tier in the latest cycle",
                &["tier"]
            )
            .expect("Failed to register tier_population"),

            terminations: register_int_counter_vec!(
                "reconciler_terminations_total",
                "Containers terminated for exceeding their tier minimum",
                &["tier"]
            )
            .expect("Failed to register terminations"),

            creation_requests: register_int_counter!(
                "reconciler_creation_requests_total",
                "Times the creation script was invoked to top up the population"
            )
            .expect("Failed to register creation_requests"),

            store_write_errors: register_int_counter!(
                "reconciler_store_write_errors_total",
                "Failed writes to the metrics store"
            )
            .expect("Failed to register store_write_errors"),

            external_command_errors: register_int_counter!(
                "reconciler_external_command_errors_total",
                "Failed invocations of scripts or the container runtime"
            )
            .expect("Failed to register external_command_errors"),
        }
    }
}

/// Reconciler metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ReconcilerMetrics {
    _private: (),
}

impl Default for ReconcilerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcilerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ReconcilerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ReconcilerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn inc_cycles_completed(&self) {
        self.inner().cycles_completed.inc();
    }

    pub fn inc_cycles_aborted(&self) {
        self.inner().cycles_aborted.inc();
    }

    pub fn set_containers_observed(&self, count: i64) {
        self.inner().containers_observed.set(count);
    }

    pub fn set_tier_population(&self, tier: Tier, count: i64) {
        self.inner()
            .tier_population
            .with_label_values(&[tier.as_str()])
            .set(count);
    }

    pub fn inc_terminations(&self, tier: Tier) {
        self.inner()
            .terminations
            .with_label_values(&[tier.as_str()])
            .inc();
    }

    pub fn inc_creation_requests(&self) {
        self.inner().creation_requests.inc();
    }

    pub fn inc_store_write_errors(&self) {
        self.inner().store_write_errors.inc();
    }

    pub fn inc_external_command_errors(&self) {
        self.inner().external_command_errors.inc();
    }
}

/// Structured logger for daemon events
///
/// Keeps the `event` field consistent across lifecycle and enforcement logs.
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64) {
        info!(
            event = "daemon_started",
            host = %self.host,
            daemon_version = %version,
            interval_secs = interval_secs,
            "Reconciler daemon started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "daemon_shutdown",
            host = %self.host,
            reason = %reason,
            "Reconciler daemon shutting down"
        );
    }

    pub fn log_telemetry_unavailable(&self, path: &str, error: &str, file_exists: bool) {
        if file_exists {
            warn!(
                event = "telemetry_unavailable",
                host = %self.host,
                path = %path,
                error = %error,
                "Telemetry snapshot could not be used, skipping cycle"
            );
        } else {
            warn!(
                event = "telemetry_unavailable",
                host = %self.host,
                path = %path,
                error = %error,
                "Telemetry file does not exist, is the kernel module loaded?"
            );
        }
    }

    pub fn log_cycle(
        &self,
        total_memory_kb: u64,
        free_memory_kb: u64,
        containers: usize,
        low_tier: usize,
        high_tier: usize,
        terminated: usize,
        creation_requested: bool,
    ) {
        info!(
            event = "cycle_completed",
            host = %self.host,
            total_memory_kb = total_memory_kb,
            free_memory_kb = free_memory_kb,
            containers = containers,
            low_tier = low_tier,
            high_tier = high_tier,
            terminated = terminated,
            creation_requested = creation_requested,
            "Reconciliation cycle complete"
        );
    }

    pub fn log_termination(
        &self,
        container: &ContainerRecord,
        runtime_id: &str,
        tier: Tier,
        reason: &str,
    ) {
        warn!(
            event = "container_terminated",
            host = %self.host,
            pid = container.pid,
            name = %container.name,
            runtime_id = %runtime_id,
            rss_kb = container.rss_kb,
            cpu_percent = container.cpu_percent,
            tier = %tier,
            reason = %reason,
            "Terminated excess container"
        );
    }

    pub fn log_creation_request(&self, current: usize, required: usize) {
        info!(
            event = "creation_requested",
            host = %self.host,
            current = current,
            required = required,
            "Container population below minimum, requesting creation"
        );
    }
}
