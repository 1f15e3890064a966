//! One reconciliation cycle: read, persist, classify, enforce

use crate::error::ReconcileError;
use crate::health::{components, HealthRegistry};
use crate::models::Tier;
use crate::observability::{ReconcilerMetrics, StructuredLogger};
use crate::policy::Policy;
use crate::reconcile::{classify, EnforcementReport, PolicyEnforcer};
use crate::runtime::{ContainerRuntime, ScriptRunner};
use crate::snapshot::SnapshotReader;
use crate::store::MetricsStore;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;

/// Summary of a completed cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub total_memory_kb: u64,
    pub free_memory_kb: u64,
    pub containers_observed: usize,
    pub low_tier: usize,
    pub high_tier: usize,
    pub enforcement: EnforcementReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Telemetry was missing or malformed; nothing was persisted
    Aborted,
    Completed(CycleReport),
}

/// Runs cycles against an open store
pub struct CycleRunner {
    policy: Policy,
    reader: SnapshotReader,
    store: Arc<MetricsStore>,
    enforcer: PolicyEnforcer,
    metrics: ReconcilerMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl CycleRunner {
    pub fn new(
        policy: Policy,
        store: Arc<MetricsStore>,
        runtime: Arc<dyn ContainerRuntime>,
        scripts: Arc<dyn ScriptRunner>,
        logger: StructuredLogger,
        health: HealthRegistry,
    ) -> Self {
        let metrics = ReconcilerMetrics::new();
        let reader = SnapshotReader::new(
            policy.system_info_path.clone(),
            policy.container_info_path.clone(),
        );
        let enforcer = PolicyEnforcer::new(
            runtime,
            scripts,
            store.clone(),
            metrics.clone(),
            logger.clone(),
        );

        Self {
            policy,
            reader,
            store,
            enforcer,
            metrics,
            logger,
            health,
        }
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let start = Instant::now();

        // Both snapshots are read before anything is written so a cycle is
        // either persisted whole or not at all.
        let system = match self.reader.read_system_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.abort(self.reader.system_path(), e).await,
        };
        let containers = match self.reader.read_container_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.abort(self.reader.container_path(), e).await,
        };
        self.health.set_healthy(components::SNAPSHOT_READER).await;

        self.store.record_system_sample(&system);
        self.store.record_container_samples(&containers);
        if self.store.is_open() {
            self.health.set_healthy(components::METRICS_STORE).await;
        } else {
            self.health
                .set_degraded(components::METRICS_STORE, "store closed")
                .await;
        }

        let observed = containers.containers.len();
        self.metrics.set_containers_observed(observed as i64);

        let tiers = classify(&containers.containers, &self.policy);
        let (low_tier, high_tier) = (tiers.low.len(), tiers.high.len());
        self.metrics.set_tier_population(Tier::Low, low_tier as i64);
        self.metrics.set_tier_population(Tier::High, high_tier as i64);
        let enforcement = self.enforcer.reconcile(tiers, &self.policy).await;
        self.health.set_healthy(components::ENFORCER).await;

        self.logger.log_cycle(
            containers.memory.total_kb,
            containers.memory.free_kb,
            observed,
            low_tier,
            high_tier,
            enforcement.terminated.len(),
            enforcement.creation_requested,
        );
        self.metrics
            .observe_cycle_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_cycles_completed();

        CycleOutcome::Completed(CycleReport {
            total_memory_kb: containers.memory.total_kb,
            free_memory_kb: containers.memory.free_kb,
            containers_observed: observed,
            low_tier,
            high_tier,
            enforcement,
        })
    }

    async fn abort(&self, path: &Path, error: ReconcileError) -> CycleOutcome {
        let file_exists = tokio::fs::try_exists(path).await.unwrap_or(false);

        self.metrics.inc_cycles_aborted();
        self.health
            .set_degraded(components::SNAPSHOT_READER, error.to_string())
            .await;
        self.logger.log_telemetry_unavailable(
            &path.display().to_string(),
            &error.to_string(),
            file_exists,
        );

        CycleOutcome::Aborted
    }
}
