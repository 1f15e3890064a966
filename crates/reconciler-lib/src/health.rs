//! Daemon health as reported by `/healthz` and `/readyz`
//!
//! Components report their own status as the daemon works. Readiness follows
//! the lifecycle phase: only a running daemon with no failed component is
//! ready, so the endpoint goes unready as soon as draining starts.

use crate::daemon::Phase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working, but the last attempt hit a recoverable problem
    Degraded,
    Unhealthy,
}

/// Last reported state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn observed(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::observed(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::observed(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::observed(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub phase: Phase,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across `components`; no components counts as healthy
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const SNAPSHOT_READER: &str = "snapshot_reader";
    pub const METRICS_STORE: &str = "metrics_store";
    pub const CONTAINER_RUNTIME: &str = "container_runtime";
    pub const ENFORCER: &str = "enforcer";

    pub const ALL: [&str; 4] = [SNAPSHOT_READER, METRICS_STORE, CONTAINER_RUNTIME, ENFORCER];
}

/// Shared view of component health and the daemon phase
///
/// Cloning is cheap; the control loop, the cycle runner and the API all hold
/// handles to the same state.
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    phase: Arc<RwLock<Phase>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            phase: Arc::new(RwLock::new(Phase::Bootstrapping)),
        }
    }

    /// Registry with every reconciler component registered as healthy
    pub async fn with_components() -> Self {
        let registry = Self::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        registry
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record the phase the control loop just entered
    pub async fn set_phase(&self, phase: Phase) {
        *self.phase.write().await = phase;
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        HealthResponse {
            status: HealthResponse::compute_status(&components),
            phase: self.phase().await,
            components,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let health = self.health().await;

        let reason = match health.phase {
            Phase::Running if health.status == ComponentStatus::Unhealthy => {
                Some("Critical component unhealthy")
            }
            Phase::Running => None,
            Phase::Bootstrapping => Some("Daemon is bootstrapping"),
            Phase::Draining => Some("Daemon is draining"),
            Phase::Stopped => Some("Daemon has stopped"),
        };

        ReadinessResponse {
            ready: reason.is_none(),
            phase: health.phase,
            reason: reason.map(str::to_string),
        }
    }
}
