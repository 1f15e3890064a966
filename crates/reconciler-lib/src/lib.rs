//! Container tier reconciliation library
//!
//! This crate provides the core functionality for:
//! - Reading kernel telemetry snapshots
//! - Persisting samples and the action audit trail in SQLite
//! - Classifying containers into consumption tiers
//! - Enforcing per-tier population minimums through the container runtime
//! - The daemon control loop, health checks and observability

pub mod daemon;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod reconcile;
pub mod runtime;
pub mod snapshot;
pub mod store;

pub use daemon::{Capabilities, ControlLoop, ControlLoopBuilder, Phase};
pub use error::{ReconcileError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ReconcilerMetrics, StructuredLogger};
pub use policy::Policy;
pub use store::MetricsStore;
