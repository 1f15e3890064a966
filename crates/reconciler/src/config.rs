//! Reconciler configuration

use anyhow::{bail, Result};
use reconciler_lib::policy::{DEFAULT_CONTAINER_INFO_PATH, DEFAULT_SYSTEM_INFO_PATH};
use reconciler_lib::Policy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the optional config file
pub const CONFIG_PATH_ENV: &str = "RECONCILER_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "reconciler.toml";

/// Reconciler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Host name used in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_system_info_path")]
    pub system_info_path: PathBuf,

    #[serde(default = "default_container_info_path")]
    pub container_info_path: PathBuf,

    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_loop_interval")]
    pub loop_interval_secs: u64,

    #[serde(default = "default_min_low")]
    pub min_low_consumption: usize,

    #[serde(default = "default_min_high")]
    pub min_high_consumption: usize,

    /// Resident memory above which a container is high consumption
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold_kb: u64,

    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold_percent: f64,

    /// Root holding `Bash/` and the compose file; defaults to the parent of
    /// the working directory
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// Container runtime CLI
    #[serde(default = "default_docker_binary")]
    pub docker_binary: PathBuf,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_system_info_path() -> PathBuf {
    PathBuf::from(DEFAULT_SYSTEM_INFO_PATH)
}

fn default_container_info_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONTAINER_INFO_PATH)
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./monitoring.db")
}

fn default_loop_interval() -> u64 {
    20
}

fn default_min_low() -> usize {
    3
}

fn default_min_high() -> usize {
    2
}

fn default_memory_threshold() -> u64 {
    30_000
}

fn default_cpu_threshold() -> f64 {
    80.0
}

fn default_docker_binary() -> PathBuf {
    PathBuf::from("docker")
}

impl ReconcilerConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Load with `path` as the (optional) config file
    ///
    /// `RECONCILER_*` environment variables override file values.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("RECONCILER").try_parsing(true))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.loop_interval_secs == 0 {
            bail!("loop_interval_secs must be greater than zero");
        }
        if !self.cpu_threshold_percent.is_finite() || self.cpu_threshold_percent < 0.0 {
            bail!("cpu_threshold_percent must be a non-negative number");
        }
        Ok(())
    }

    /// Project root, falling back to the parent of the working directory
    pub fn project_root(&self) -> PathBuf {
        if let Some(root) = &self.project_root {
            return root.clone();
        }
        std::env::current_dir()
            .ok()
            .and_then(|cwd| cwd.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Reconciliation policy described by this configuration
    pub fn policy(&self) -> Policy {
        let mut policy = Policy::for_project_root(self.project_root());
        policy.system_info_path = self.system_info_path.clone();
        policy.container_info_path = self.container_info_path.clone();
        policy.db_path = self.db_path.clone();
        policy.loop_interval = Duration::from_secs(self.loop_interval_secs);
        policy.min_low_consumption = self.min_low_consumption;
        policy.min_high_consumption = self.min_high_consumption;
        policy.memory_threshold_kb = self.memory_threshold_kb;
        policy.cpu_threshold_percent = self.cpu_threshold_percent;
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            ReconcilerConfig::load_from(Path::new("/nonexistent/reconciler.toml")).unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.loop_interval_secs, 20);
        assert_eq!(config.min_low_consumption, 3);
        assert_eq!(config.min_high_consumption, 2);
        assert_eq!(config.memory_threshold_kb, 30_000);
        assert_eq!(config.cpu_threshold_percent, 80.0);
        assert_eq!(config.db_path, PathBuf::from("./monitoring.db"));
        assert_eq!(config.system_info_path, PathBuf::from(DEFAULT_SYSTEM_INFO_PATH));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file = toml_file(
            r#"
            loop_interval_secs = 5
            min_low_consumption = 1
            cpu_threshold_percent = 65.5
            project_root = "/opt/lab"
            "#,
        );

        let config = ReconcilerConfig::load_from(file.path()).unwrap();
        assert_eq!(config.loop_interval_secs, 5);
        assert_eq!(config.min_low_consumption, 1);
        assert_eq!(config.min_high_consumption, 2);

        let policy = config.policy();
        assert_eq!(policy.loop_interval, Duration::from_secs(5));
        assert_eq!(policy.cpu_threshold_percent, 65.5);
        assert_eq!(policy.project_root, PathBuf::from("/opt/lab"));
        assert_eq!(
            policy.scripts.create_containers,
            PathBuf::from("/opt/lab/Bash/create_containers.sh")
        );
        assert_eq!(
            policy.scripts.kernel_modules,
            PathBuf::from("/opt/lab/load_kernel_modules.sh")
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = toml_file("loop_interval_secs = 0\n");
        assert!(ReconcilerConfig::load_from(file.path()).is_err());
    }
}
