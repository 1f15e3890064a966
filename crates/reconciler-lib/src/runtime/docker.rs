//! Docker CLI backed container runtime

use super::command::run;
use super::ContainerRuntime;
use crate::error::{ReconcileError, Result};
use crate::policy::DashboardSpec;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Container runtime that shells out to the `docker` binary
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: PathBuf,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a specific docker-compatible binary (e.g. `podman`)
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn program(&self) -> String {
        self.binary.to_string_lossy().into_owned()
    }

    async fn docker(&self, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let output = run(&self.program(), args, cwd).await?;
        Ok(output.stdout)
    }

    /// Split `docker ... -q` output into non-empty identifiers
    pub fn parse_id_list(output: &str) -> Vec<String> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Parse the output of `docker inspect -f '{{.State.Pid}}'`
    pub fn parse_pid(output: &str) -> Option<u32> {
        output.trim().parse().ok()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<String>> {
        let output = self.docker(&["ps", "-q", "--no-trunc"], None).await?;
        Ok(Self::parse_id_list(&output))
    }

    async fn root_pid(&self, id: &str) -> Result<u32> {
        let output = self
            .docker(&["inspect", "-f", "{{.State.Pid}}", id], None)
            .await?;
        Self::parse_pid(&output).ok_or_else(|| {
            ReconcileError::external(
                format!("docker inspect {}", id),
                format!("unexpected pid output {:?}", output.trim()),
            )
        })
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.docker(&["stop", id], None).await.map(|_| ())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.docker(&["rm", id], None).await.map(|_| ())
    }

    async fn is_running_named(&self, name: &str) -> Result<bool> {
        let filter = format!("name={}", name);
        let output = self.docker(&["ps", "-q", "-f", filter.as_str()], None).await?;
        Ok(!output.trim().is_empty())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self.docker(&["images", "-q", image], None).await?;
        Ok(!output.trim().is_empty())
    }

    async fn build_image(&self, image: &str, context_dir: &Path) -> Result<()> {
        self.docker(&["build", "-t", image, "."], Some(context_dir))
            .await
            .map(|_| ())
    }

    async fn compose_up(&self, service: &str, project_dir: &Path) -> Result<()> {
        match self
            .docker(&["compose", "up", "-d", service], Some(project_dir))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "docker compose failed, trying legacy docker-compose");
                run("docker-compose", &["up", "-d", service], Some(project_dir))
                    .await
                    .map(|_| ())
            }
        }
    }

    async fn run_detached(&self, spec: &DashboardSpec) -> Result<String> {
        let mut args: Vec<&str> = vec![
            "run",
            "-d",
            "--name",
            spec.container_name.as_str(),
            "-p",
            spec.port_mapping.as_str(),
        ];
        for env in &spec.env {
            args.push("-e");
            args.push(env.as_str());
        }
        args.extend([
            "-v",
            spec.volume.as_str(),
            "--restart",
            "unless-stopped",
            spec.image.as_str(),
        ]);

        let output = self.docker(&args, None).await?;
        let id = output.trim().to_string();
        debug!(container = %spec.container_name, id = %id, "Started detached container");
        Ok(id)
    }
}
