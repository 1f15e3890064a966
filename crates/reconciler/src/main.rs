//! Container tier reconciler daemon
//!
//! Reads kernel telemetry on a fixed period, records it in SQLite and keeps
//! the low and high consumption container populations at their configured
//! minimums.

use anyhow::Result;
use reconciler_lib::{
    daemon::{Capabilities, ControlLoopBuilder},
    health::HealthRegistry,
    observability::{ReconcilerMetrics, StructuredLogger},
    runtime::{BashScriptRunner, CronTrigger, DockerRuntime},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting container reconciler");

    let config = config::ReconcilerConfig::load()?;
    let policy = config.policy();
    info!(
        node_name = %config.node_name,
        project_root = %policy.project_root.display(),
        db_path = %policy.db_path.display(),
        "Reconciler configured"
    );

    let health_registry = HealthRegistry::with_components().await;
    let metrics = ReconcilerMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_port = config.api_port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, port = api_port, "API server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(wait_for_signal(shutdown_tx));

    let capabilities = Capabilities {
        runtime: Arc::new(DockerRuntime::with_binary(&config.docker_binary)),
        scripts: Arc::new(BashScriptRunner::new(policy.scripts.clone())),
        trigger: Arc::new(CronTrigger::every_minute(&policy.scripts.create_containers)),
    };

    let control_loop = ControlLoopBuilder::new(policy)
        .capabilities(capabilities)
        .logger(logger)
        .health(health_registry)
        .build()?;

    let result = control_loop.run(shutdown_rx).await;
    api_handle.abort();

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "Reconciler failed to start");
            Err(e.into())
        }
    }
}

/// Notify the control loop on SIGINT or SIGTERM
async fn wait_for_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                    _ = sigterm.recv() => info!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("SIGINT received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("SIGINT received");
    }

    let _ = shutdown_tx.send(());
}
