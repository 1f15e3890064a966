//! HTTP API for health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use reconciler_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::ReconcilerMetrics,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ReconcilerMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: ReconcilerMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - 200 while the control loop is running
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use reconciler_lib::{health::components, models::Tier, Phase};
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            HealthRegistry::with_components().await,
            ReconcilerMetrics::new(),
        ));
        (create_router(state.clone()), state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = get(app, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_lists_components_and_phase() {
        let (app, _state) = test_app().await;

        let (status, health) = get_json(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["phase"], "bootstrapping");
        for name in components::ALL {
            assert!(health["components"][name].is_object());
        }
    }

    #[tokio::test]
    async fn test_healthz_degraded_is_still_ok() {
        let (app, state) = test_app().await;
        state
            .health_registry
            .set_degraded(components::SNAPSHOT_READER, "telemetry file missing")
            .await;

        let (status, health) = get_json(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "degraded");
        assert_eq!(
            health["components"][components::SNAPSHOT_READER]["message"],
            "telemetry file missing"
        );
    }

    #[tokio::test]
    async fn test_healthz_unhealthy_store_is_503() {
        let (app, state) = test_app().await;
        state
            .health_registry
            .set_unhealthy(components::METRICS_STORE, "unable to open database file")
            .await;

        let (status, health) = get_json(app, "/healthz").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_readyz_follows_daemon_phase() {
        let (app, state) = test_app().await;

        let (status, readiness) = get_json(app.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(readiness["reason"], "Daemon is bootstrapping");

        state.health_registry.set_phase(Phase::Running).await;
        let (status, readiness) = get_json(app.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(readiness["ready"], true);
        assert!(readiness.get("reason").is_none());

        state.health_registry.set_phase(Phase::Draining).await;
        let (status, readiness) = get_json(app, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(readiness["phase"], "draining");
    }

    #[tokio::test]
    async fn test_readyz_running_but_runtime_unhealthy() {
        let (app, state) = test_app().await;
        state.health_registry.set_phase(Phase::Running).await;
        state
            .health_registry
            .set_unhealthy(components::CONTAINER_RUNTIME, "docker not found")
            .await;

        let (status, readiness) = get_json(app, "/readyz").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(readiness["reason"], "Critical component unhealthy");
    }

    #[tokio::test]
    async fn test_metrics_exposes_reconciler_families() {
        let (app, state) = test_app().await;
        state.metrics.observe_cycle_latency(0.02);
        state.metrics.inc_cycles_completed();
        state.metrics.set_tier_population(Tier::Low, 3);
        state.metrics.inc_terminations(Tier::High);
        state.metrics.inc_store_write_errors();

        let (status, body) = get(app, "/metrics").await;
        let text = String::from_utf8(body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("reconciler_cycle_latency_seconds_bucket"));
        assert!(text.contains("reconciler_cycles_completed_total"));
        assert!(text.contains("reconciler_tier_population{tier=\"low\"}"));
        assert!(text.contains("reconciler_terminations_total{tier=\"high\"}"));
        assert!(text.contains("reconciler_store_write_errors_total"));
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let taken = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let (_app, state) = test_app().await;

        let result = serve(port, state).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _state) = test_app().await;
        let (status, _) = get(app, "/cycles").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
