//! Daemon lifecycle
//!
//! The daemon moves through `Bootstrapping -> Running -> Draining -> Stopped`.
//! Bootstrapping prepares the host and opens the metrics store, Running
//! drives one reconciliation cycle per tick, Draining undoes what bootstrap
//! registered and closes the store.

mod bootstrap;
mod cycle;
mod r#loop;


pub use bootstrap::{bootstrap, build_missing_images};
pub use cycle::{CycleOutcome, CycleReport, CycleRunner};
pub use r#loop::{ControlLoop, ControlLoopBuilder};

use crate::runtime::{ContainerRuntime, CreationTrigger, ScriptRunner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Bootstrapping,
    Running,
    Draining,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Bootstrapping => "bootstrapping",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External capabilities injected into the daemon
#[derive(Clone)]
pub struct Capabilities {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub trigger: Arc<dyn CreationTrigger>,
}

/// What bootstrap managed to set up, consulted again when draining
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonState {
    pub dashboard_started: bool,
    pub trigger_registered: bool,
}
