//! Auxiliary dashboard startup
//!
//! Tries compose first, then falls back to a plain detached run. A dashboard
//! that is already running counts as started.

use super::ContainerRuntime;
use crate::error::Result;
use crate::policy::DashboardSpec;
use std::path::Path;
use tracing::{debug, info, warn};

/// How the dashboard came up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardStart {
    AlreadyRunning,
    Compose,
    Direct(String),
}

pub async fn start_dashboard(
    runtime: &dyn ContainerRuntime,
    spec: &DashboardSpec,
    project_root: &Path,
) -> Result<DashboardStart> {
    match runtime.is_running_named(&spec.container_name).await {
        Ok(true) => {
            info!(container = %spec.container_name, "Dashboard already running");
            return Ok(DashboardStart::AlreadyRunning);
        }
        Ok(false) => {}
        Err(e) => debug!(error = %e, "Could not check for a running dashboard"),
    }

    match runtime.compose_up(&spec.compose_service, project_root).await {
        Ok(()) => {
            info!(service = %spec.compose_service, "Dashboard started with compose");
            return Ok(DashboardStart::Compose);
        }
        Err(e) => warn!(error = %e, "Compose failed, starting dashboard directly"),
    }

    // Clear out a stopped container holding the name; usually there is none
    if let Err(e) = runtime.stop(&spec.container_name).await {
        debug!(container = %spec.container_name, error = %e, "Stale dashboard not stopped");
    }
    if let Err(e) = runtime.remove(&spec.container_name).await {
        debug!(container = %spec.container_name, error = %e, "Stale dashboard not removed");
    }

    let id = runtime.run_detached(spec).await?;
    info!(container = %spec.container_name, id = %id, "Dashboard started");
    Ok(DashboardStart::Direct(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;

    #[tokio::test]
    async fn test_already_running_dashboard() {
        let runtime = FakeRuntime::new();
        runtime.set_named_running("grafana-monitoring");

        let started = start_dashboard(&runtime, &DashboardSpec::default(), Path::new("."))
            .await
            .unwrap();

        assert_eq!(started, DashboardStart::AlreadyRunning);
        assert!(!runtime.calls().iter().any(|c| c.starts_with("compose")));
    }

    #[tokio::test]
    async fn test_compose_preferred() {
        let runtime = FakeRuntime::new();

        let started = start_dashboard(&runtime, &DashboardSpec::default(), Path::new("."))
            .await
            .unwrap();

        assert_eq!(started, DashboardStart::Compose);
        assert!(runtime.calls().contains(&"compose grafana".to_string()));
    }

    #[tokio::test]
    async fn test_falls_back_to_direct_run() {
        let runtime = FakeRuntime::new();
        runtime.fail_compose();

        let started = start_dashboard(&runtime, &DashboardSpec::default(), Path::new("."))
            .await
            .unwrap();

        assert!(matches!(started, DashboardStart::Direct(_)));
        let calls = runtime.calls();
        let stop = calls.iter().position(|c| c == "stop grafana-monitoring").unwrap();
        let run = calls.iter().position(|c| c == "run grafana-monitoring").unwrap();
        assert!(stop < run);
    }

    #[tokio::test]
    async fn test_failed_stale_cleanup_still_runs_dashboard() {
        let runtime = FakeRuntime::new();
        runtime.fail_compose();
        runtime.fail_stop("grafana-monitoring");

        let started = start_dashboard(&runtime, &DashboardSpec::default(), Path::new("."))
            .await
            .unwrap();

        assert!(matches!(started, DashboardStart::Direct(_)));
        let calls = runtime.calls();
        assert!(calls.contains(&"rm grafana-monitoring".to_string()));
        assert!(calls.contains(&"run grafana-monitoring".to_string()));
    }
}
