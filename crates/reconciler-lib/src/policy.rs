//! Reconciliation policy
//!
//! Loaded once at startup and shared read-only for the lifetime of the
//! process.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default system telemetry file exposed by the kernel module
pub const DEFAULT_SYSTEM_INFO_PATH: &str = "/proc/sysinfo_so1_202100265";

/// Default container telemetry file exposed by the kernel module
pub const DEFAULT_CONTAINER_INFO_PATH: &str = "/proc/continfo_so1_202100265";

/// Container names and command lines containing any of these are never
/// classified or terminated
pub const INFRASTRUCTURE_DENYLIST: &[&str] = &["grafana", "containerd", "dockerd"];

/// Policy driving classification and enforcement
#[derive(Debug, Clone)]
pub struct Policy {
    /// System-wide telemetry pseudo-file
    pub system_info_path: PathBuf,
    /// Container telemetry pseudo-file
    pub container_info_path: PathBuf,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Period between reconciliation cycles
    pub loop_interval: Duration,
    /// Containers kept in the low tier
    pub min_low_consumption: usize,
    /// Containers kept in the high tier
    pub min_high_consumption: usize,
    /// Resident memory above which a container is high tier
    pub memory_threshold_kb: u64,
    /// CPU percentage above which a container is high tier
    pub cpu_threshold_percent: f64,
    /// External scripts and where to run them
    pub scripts: ScriptPaths,
    /// Directory holding the compose file for the dashboard
    pub project_root: PathBuf,
    /// Auxiliary dashboard service
    pub dashboard: DashboardSpec,
    /// Worker images built at bootstrap when missing
    pub images: Vec<ImageSpec>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::for_project_root(".")
    }
}

impl Policy {
    /// Policy with the stock thresholds and every script resolved under
    /// `project_root`
    pub fn for_project_root(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let scripts = ScriptPaths::under(&project_root);
        let images = ImageSpec::catalogue(&scripts.scripts_dir);

        Self {
            system_info_path: PathBuf::from(DEFAULT_SYSTEM_INFO_PATH),
            container_info_path: PathBuf::from(DEFAULT_CONTAINER_INFO_PATH),
            db_path: PathBuf::from("./monitoring.db"),
            loop_interval: Duration::from_secs(20),
            min_low_consumption: 3,
            min_high_consumption: 2,
            memory_threshold_kb: 30_000,
            cpu_threshold_percent: 80.0,
            scripts,
            project_root,
            dashboard: DashboardSpec::default(),
            images,
        }
    }

    /// Minimum combined population across both tiers
    pub fn min_total(&self) -> usize {
        self.min_low_consumption + self.min_high_consumption
    }
}

/// Locations of the external shell scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPaths {
    /// Working directory for every script invocation
    pub scripts_dir: PathBuf,
    pub create_containers: PathBuf,
    pub clean_containers: PathBuf,
    /// Optional; skipped when absent
    pub kernel_modules: PathBuf,
}

impl ScriptPaths {
    pub fn under(project_root: &Path) -> Self {
        let scripts_dir = project_root.join("Bash");
        Self {
            create_containers: scripts_dir.join("create_containers.sh"),
            clean_containers: scripts_dir.join("clean_containers.sh"),
            kernel_modules: project_root.join("load_kernel_modules.sh"),
            scripts_dir,
        }
    }

    /// Scripts whose absence is fatal at bootstrap
    pub fn required(&self) -> [&Path; 2] {
        [&self.create_containers, &self.clean_containers]
    }
}

/// Auxiliary dashboard container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSpec {
    pub container_name: String,
    pub compose_service: String,
    pub image: String,
    pub port_mapping: String,
    pub env: Vec<String>,
    pub volume: String,
}

impl Default for DashboardSpec {
    fn default() -> Self {
        Self {
            container_name: "grafana-monitoring".to_string(),
            compose_service: "grafana".to_string(),
            image: "grafana/grafana:latest".to_string(),
            port_mapping: "3000:3000".to_string(),
            env: vec!["GF_SECURITY_ADMIN_PASSWORD=admin".to_string()],
            volume: "grafana-data:/var/lib/grafana".to_string(),
        }
    }
}

/// Worker image and its build context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub name: String,
    pub context_dir: PathBuf,
}

impl ImageSpec {
    /// Stock worker images, built from `<scripts>/docker-images/<dir>`
    pub fn catalogue(scripts_dir: &Path) -> Vec<Self> {
        let images_root = scripts_dir.join("docker-images");
        [
            ("high-cpu-image", "high-cpu"),
            ("high-ram-image", "high-ram"),
            ("low-consumption-image", "low-consumption"),
        ]
        .into_iter()
        .map(|(name, dir)| Self {
            name: name.to_string(),
            context_dir: images_root.join(dir),
        })
        .collect()
    }
}
