//! Host preparation before the first cycle

use super::{Capabilities, DaemonState};
use crate::error::Result;
use crate::health::{components, HealthRegistry};
use crate::observability::ReconcilerMetrics;
use crate::policy::{ImageSpec, Policy};
use crate::runtime::{start_dashboard, ContainerRuntime, Script, ScriptRunner};
use crate::store::MetricsStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prepare the host and open the metrics store
///
/// Only a missing required script or a store that cannot be opened fails
/// bootstrap. Every other step is logged and skipped on error.
pub async fn bootstrap(
    policy: &Policy,
    capabilities: &Capabilities,
    metrics: &ReconcilerMetrics,
    health: &HealthRegistry,
) -> Result<(Arc<MetricsStore>, DaemonState)> {
    let mut state = DaemonState::default();

    capabilities.scripts.validate()?;

    let store = match MetricsStore::open(&policy.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            health
                .set_unhealthy(components::METRICS_STORE, e.to_string())
                .await;
            return Err(e);
        }
    };

    run_best_effort(capabilities.scripts.as_ref(), Script::CleanContainers, metrics).await;

    match start_dashboard(
        capabilities.runtime.as_ref(),
        &policy.dashboard,
        &policy.project_root,
    )
    .await
    {
        Ok(how) => {
            debug!(start = ?how, "Dashboard available");
            state.dashboard_started = true;
        }
        Err(e) => {
            metrics.inc_external_command_errors();
            health
                .set_degraded(components::CONTAINER_RUNTIME, format!("dashboard: {}", e))
                .await;
            warn!(error = %e, "Failed to start dashboard");
        }
    }

    match capabilities.trigger.install().await {
        Ok(()) => {
            info!("Periodic creation trigger installed");
            state.trigger_registered = true;
        }
        Err(e) => {
            metrics.inc_external_command_errors();
            warn!(error = %e, "Failed to install periodic creation trigger");
        }
    }

    build_missing_images(capabilities.runtime.as_ref(), &policy.images, metrics).await;

    if capabilities.scripts.is_present(Script::LoadKernelModules) {
        run_best_effort(capabilities.scripts.as_ref(), Script::LoadKernelModules, metrics).await;
    } else {
        info!("Kernel module script not found, assuming telemetry is already loaded");
    }

    run_best_effort(capabilities.scripts.as_ref(), Script::CreateContainers, metrics).await;

    Ok((store, state))
}

/// Build every catalogue image the runtime does not have yet
///
/// Returns the names of the images that were built. A failed build does not
/// stop the next one.
pub async fn build_missing_images(
    runtime: &dyn ContainerRuntime,
    images: &[ImageSpec],
    metrics: &ReconcilerMetrics,
) -> Vec<String> {
    let mut built = Vec::new();

    for image in images {
        match runtime.image_exists(&image.name).await {
            Ok(true) => {
                debug!(image = %image.name, "Image already present");
                continue;
            }
            Ok(false) => {}
            Err(e) => debug!(image = %image.name, error = %e, "Could not check image, building"),
        }

        info!(image = %image.name, context = %image.context_dir.display(), "Building image");
        match runtime.build_image(&image.name, &image.context_dir).await {
            Ok(()) => built.push(image.name.clone()),
            Err(e) => {
                metrics.inc_external_command_errors();
                warn!(image = %image.name, error = %e, "Image build failed");
            }
        }
    }

    built
}

pub(super) async fn run_best_effort(
    scripts: &dyn ScriptRunner,
    script: Script,
    metrics: &ReconcilerMetrics,
) {
    match scripts.run(script).await {
        Ok(output) => debug!(script = %script, output = %output.trim(), "Script finished"),
        Err(e) => {
            metrics.inc_external_command_errors();
            warn!(script = %script, error = %e, "Script failed");
        }
    }
}
