//! Core data models for the reconciler
//!
//! Snapshot types mirror the JSON documents exposed by the kernel telemetry
//! module. They are decoded once per cycle and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Memory totals reported by both telemetry files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    pub used_kb: u64,
}

/// Host identification block of the system snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemDetails {
    pub kernel: String,
    pub architecture: String,
    pub hostname: String,
}

/// Process counts by scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub total: u64,
    pub running: u64,
    pub sleeping: u64,
    pub other: u64,
}

/// One process entry of the system snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub cmdline: String,
    pub vsz_kb: u64,
    pub rss_kb: u64,
    pub memory_percent: f64,
    pub cpu_percent: f64,
    pub state: String,
}

/// System-wide telemetry snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub timestamp: String,
    pub system: SystemDetails,
    pub memory: MemoryInfo,
    pub process_summary: ProcessSummary,
    pub processes: Vec<ProcessRecord>,
}

/// One container entry of the container snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub cmdline: String,
    pub vsz_kb: u64,
    pub rss_kb: u64,
    pub memory_percent: f64,
    pub cpu_percent: f64,
}

/// Container-wide telemetry snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub timestamp: String,
    pub memory: MemoryInfo,
    pub containers: Vec<ContainerRecord>,
}

/// Consumption tier assigned to a container for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::High => "high",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of lifecycle action written to the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Terminated,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Terminated => "terminated",
        }
    }
}

/// Audit record of one enforcement decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: ActionKind,
    pub container_pid: u32,
    pub container_name: String,
    pub reason: String,
}

impl ActionRecord {
    pub fn terminated(container: &ContainerRecord, reason: impl Into<String>) -> Self {
        Self {
            action: ActionKind::Terminated,
            container_pid: container.pid,
            container_name: container.name.clone(),
            reason: reason.into(),
        }
    }
}

/// A row read back from `system_metrics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSample {
    pub id: i64,
    pub timestamp: String,
    pub total_memory_kb: u64,
    pub free_memory_kb: u64,
    pub used_memory_kb: u64,
    pub total_processes: u64,
    pub running_processes: u64,
    pub sleeping_processes: u64,
}

/// A row read back from `container_actions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAction {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub container_pid: u32,
    pub container_name: String,
    pub reason: String,
}
