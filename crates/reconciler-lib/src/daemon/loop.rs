//! Control loop
//!
//! Drives the daemon through its lifecycle. Cycles run one at a time on a
//! fixed-period timer; a shutdown notification is only observed between
//! cycles, so an in-flight cycle always finishes its writes before the store
//! is closed.

use super::bootstrap::{bootstrap, run_best_effort};
use super::cycle::{CycleOutcome, CycleRunner};
use super::{Capabilities, DaemonState, Phase};
use crate::error::Result;
use crate::health::HealthRegistry;
use crate::observability::{ReconcilerMetrics, StructuredLogger};
use crate::policy::Policy;
use crate::runtime::Script;
use crate::store::MetricsStore;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct ControlLoop {
    policy: Policy,
    capabilities: Capabilities,
    metrics: ReconcilerMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
    phase: Phase,
}

impl ControlLoop {
    pub fn new(
        policy: Policy,
        capabilities: Capabilities,
        logger: StructuredLogger,
        health: HealthRegistry,
    ) -> Self {
        Self {
            policy,
            capabilities,
            metrics: ReconcilerMetrics::new(),
            logger,
            health,
            phase: Phase::Bootstrapping,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run until `shutdown` fires, then drain
    ///
    /// Returns an error only when bootstrap fails; the caller should treat
    /// it as fatal.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        self.enter(Phase::Bootstrapping).await;
        let bootstrapped = bootstrap(
            &self.policy,
            &self.capabilities,
            &self.metrics,
            &self.health,
        )
        .await;
        let (store, state) = match bootstrapped {
            Ok(ready) => ready,
            Err(e) => {
                self.enter(Phase::Stopped).await;
                return Err(e);
            }
        };

        let runner = CycleRunner::new(
            self.policy.clone(),
            store,
            self.capabilities.runtime.clone(),
            self.capabilities.scripts.clone(),
            self.logger.clone(),
            self.health.clone(),
        );

        self.enter(Phase::Running).await;
        self.logger.log_startup(
            env!("CARGO_PKG_VERSION"),
            self.policy.loop_interval.as_secs(),
        );

        let period = self.policy.loop_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        // Shutdown is polled first: after an overrun the tick is ready at
        // once and must not win against a pending shutdown.
        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!(cycles = cycles, "Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    cycles += 1;
                    if let CycleOutcome::Aborted = runner.run_cycle().await {
                        debug!(cycle = cycles, "Cycle aborted");
                    }
                }
            }
        }

        self.enter(Phase::Draining).await;
        self.logger.log_shutdown("signal");
        self.drain(runner.store(), state).await;
        self.enter(Phase::Stopped).await;

        Ok(())
    }

    /// Undo what bootstrap registered and close the store
    async fn drain(&self, store: &MetricsStore, state: DaemonState) {
        let scripts = self.capabilities.scripts.as_ref();
        run_best_effort(scripts, Script::CleanContainers, &self.metrics).await;

        if state.trigger_registered {
            match self.capabilities.trigger.remove().await {
                Ok(()) => info!("Periodic creation trigger removed"),
                Err(e) => {
                    self.metrics.inc_external_command_errors();
                    warn!(error = %e, "Failed to remove periodic creation trigger");
                }
            }
        }
        if state.dashboard_started {
            debug!(container = %self.policy.dashboard.container_name, "Leaving dashboard running");
        }

        store.close();
    }

    async fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
        self.health.set_phase(phase).await;
    }
}

/// Builder for the control loop
pub struct ControlLoopBuilder {
    policy: Policy,
    capabilities: Option<Capabilities>,
    logger: Option<StructuredLogger>,
    health: Option<HealthRegistry>,
}

impl ControlLoopBuilder {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            capabilities: None,
            logger: None,
            health: None,
        }
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Override the tick period
    pub fn interval(mut self, interval: Duration) -> Self {
        self.policy.loop_interval = interval;
        self
    }

    /// Build the control loop
    pub fn build(self) -> anyhow::Result<ControlLoop> {
        let capabilities = self
            .capabilities
            .ok_or_else(|| anyhow::anyhow!("Capabilities are required"))?;
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("localhost"));
        let health = self.health.unwrap_or_default();

        Ok(ControlLoop::new(self.policy, capabilities, logger, health))
    }
}
