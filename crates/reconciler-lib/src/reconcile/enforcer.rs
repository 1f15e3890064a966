//! Per-tier population enforcement
//!
//! Each tier keeps its `minimum` largest-memory members and loses the rest.
//! When the surviving population falls short of the combined minimum the
//! operator's creation script is run; the enforcer never decides how many
//! containers to create or of which kind.

use super::classifier::Tiers;
use super::locator::ContainerLocator;
use crate::error::{ReconcileError, Result};
use crate::models::{ActionRecord, ContainerRecord, Tier};
use crate::observability::{ReconcilerMetrics, StructuredLogger};
use crate::policy::Policy;
use crate::runtime::{ContainerRuntime, Script, ScriptRunner};
use crate::store::MetricsStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Split a sorted tier into the kept head and the excess tail
pub fn split_tier(
    mut tier: Vec<ContainerRecord>,
    minimum: usize,
) -> (Vec<ContainerRecord>, Vec<ContainerRecord>) {
    let keep = tier.len().min(minimum);
    let excess = tier.split_off(keep);
    (tier, excess)
}

/// Reason recorded in the audit trail for an excess member of `tier`
pub fn excess_reason(tier: Tier) -> &'static str {
    match tier {
        Tier::Low => "excess low-consumption container",
        Tier::High => "excess high-consumption container",
    }
}

/// A container that was stopped and removed
#[derive(Debug, Clone, PartialEq)]
pub struct Termination {
    pub container: ContainerRecord,
    pub runtime_id: String,
    pub tier: Tier,
}

/// Outcome of one enforcement pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnforcementReport {
    pub terminated: Vec<Termination>,
    /// Pids selected for termination that no running container matched
    pub skipped: Vec<u32>,
    pub surviving_low: usize,
    pub surviving_high: usize,
    pub creation_requested: bool,
}

impl EnforcementReport {
    pub fn surviving(&self) -> usize {
        self.surviving_low + self.surviving_high
    }
}

pub struct PolicyEnforcer {
    runtime: Arc<dyn ContainerRuntime>,
    locator: ContainerLocator,
    scripts: Arc<dyn ScriptRunner>,
    store: Arc<MetricsStore>,
    metrics: ReconcilerMetrics,
    logger: StructuredLogger,
}

impl PolicyEnforcer {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        scripts: Arc<dyn ScriptRunner>,
        store: Arc<MetricsStore>,
        metrics: ReconcilerMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            locator: ContainerLocator::new(runtime.clone()),
            runtime,
            scripts,
            store,
            metrics,
            logger,
        }
    }

    /// Bring both tiers down to their minimums and request creation when short
    pub async fn reconcile(&self, tiers: Tiers, policy: &Policy) -> EnforcementReport {
        let mut report = EnforcementReport::default();

        let (low_survivors, low_excess) = split_tier(tiers.low, policy.min_low_consumption);
        let (high_survivors, high_excess) = split_tier(tiers.high, policy.min_high_consumption);
        report.surviving_low = low_survivors.len();
        report.surviving_high = high_survivors.len();

        for (tier, excess) in [(Tier::Low, low_excess), (Tier::High, high_excess)] {
            for container in excess {
                match self.terminate(&container, tier).await {
                    Ok(runtime_id) => report.terminated.push(Termination {
                        container,
                        runtime_id,
                        tier,
                    }),
                    Err(e) if is_not_found(&e) => {
                        info!(
                            pid = container.pid,
                            name = %container.name,
                            tier = %tier,
                            "No running container owns pid, skipping termination"
                        );
                        report.skipped.push(container.pid);
                    }
                    Err(e) => {
                        self.metrics.inc_external_command_errors();
                        warn!(
                            pid = container.pid,
                            name = %container.name,
                            tier = %tier,
                            error = %e,
                            "Skipping termination"
                        );
                        report.skipped.push(container.pid);
                    }
                }
            }
        }

        let required = policy.min_total();
        if report.surviving() < required {
            report.creation_requested = true;
            self.request_creation(report.surviving(), required).await;
        }

        report
    }

    /// Locate, stop and remove one container, then record the action
    ///
    /// Only a failed lookup prevents the action from being recorded. Stop and
    /// remove failures are logged and the sequence carries on.
    async fn terminate(&self, container: &ContainerRecord, tier: Tier) -> Result<String> {
        let runtime_id = self.locator.find_runtime_id(container.pid).await?;

        if let Err(e) = self.runtime.stop(&runtime_id).await {
            self.metrics.inc_external_command_errors();
            warn!(runtime_id = %runtime_id, error = %e, "Failed to stop container");
        }
        if let Err(e) = self.runtime.remove(&runtime_id).await {
            self.metrics.inc_external_command_errors();
            warn!(runtime_id = %runtime_id, error = %e, "Failed to remove container");
        }

        let reason = excess_reason(tier);
        self.store
            .record_action(&ActionRecord::terminated(container, reason));
        self.metrics.inc_terminations(tier);
        self.logger
            .log_termination(container, &runtime_id, tier, reason);

        Ok(runtime_id)
    }

    async fn request_creation(&self, current: usize, required: usize) {
        self.logger.log_creation_request(current, required);
        self.metrics.inc_creation_requests();

        match self.scripts.run(Script::CreateContainers).await {
            Ok(output) => debug!(output = %output.trim(), "Creation script finished"),
            Err(e) => {
                self.metrics.inc_external_command_errors();
                warn!(error = %e, "Creation script failed");
            }
        }
    }
}

/// Whether an error means the target container was simply not found
pub fn is_not_found(err: &ReconcileError) -> bool {
    matches!(err, ReconcileError::LocatorNotFound(_))
}
