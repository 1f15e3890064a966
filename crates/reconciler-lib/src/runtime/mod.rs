//! Capabilities backed by external processes
//!
//! The reconciler never creates containers itself. It talks to the container
//! runtime CLI, runs the operator's shell scripts and registers a periodic
//! trigger for the creation script. Each of these is a narrow trait so the
//! control loop can run against fakes in tests.

mod command;
mod cron;
mod dashboard;
mod docker;
mod scripts;

#[cfg(test)]
pub(crate) mod fake;

pub use command::{describe, run, CommandOutput};
pub use cron::CronTrigger;
pub use dashboard::{start_dashboard, DashboardStart};
pub use docker::DockerRuntime;
pub use scripts::BashScriptRunner;

use crate::error::Result;
use crate::policy::DashboardSpec;
use std::fmt;
use std::path::Path;

pub use async_trait::async_trait;

/// Container runtime operations the reconciler depends on
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Full identifiers of all running containers
    async fn list_running(&self) -> Result<Vec<String>>;

    /// Host pid of the container's root process
    async fn root_pid(&self, id: &str) -> Result<u32>;

    async fn stop(&self, id: &str) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<()>;

    /// Whether a running container has the given name
    async fn is_running_named(&self, name: &str) -> Result<bool>;

    async fn image_exists(&self, image: &str) -> Result<bool>;

    async fn build_image(&self, image: &str, context_dir: &Path) -> Result<()>;

    /// Start one service of the compose project in `project_dir`
    async fn compose_up(&self, service: &str, project_dir: &Path) -> Result<()>;

    /// Start a detached container described by `spec`, returning its id
    async fn run_detached(&self, spec: &DashboardSpec) -> Result<String>;
}

/// Operator-supplied shell scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    CreateContainers,
    CleanContainers,
    LoadKernelModules,
}

impl Script {
    pub fn as_str(&self) -> &'static str {
        match self {
            Script::CreateContainers => "create_containers",
            Script::CleanContainers => "clean_containers",
            Script::LoadKernelModules => "load_kernel_modules",
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs the operator's scripts
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Check that the required scripts exist and make them executable
    fn validate(&self) -> Result<()>;

    fn is_present(&self, script: Script) -> bool;

    /// Run a script to completion, returning its combined output
    async fn run(&self, script: Script) -> Result<String>;
}

/// Periodic trigger that runs the creation script outside the daemon
#[async_trait]
pub trait CreationTrigger: Send + Sync {
    async fn install(&self) -> Result<()>;

    async fn remove(&self) -> Result<()>;
}
