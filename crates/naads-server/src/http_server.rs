//! HTTP server for the status dashboard and Prometheus metrics.

use crate::dashboard;
use crate::metrics::MetricsRegistry;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use naads::{ClusterSnapshot, FailoverController};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
struct AppState {
    controller: Arc<FailoverController>,
    metrics: Option<Arc<MetricsRegistry>>,
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    #[serde(flatten)]
    cluster: ClusterSnapshot,
}

/// HTTP server for `/`, `/status` and `/metrics`
pub struct StatusServer {
    state: AppState,
    /// Listen address
    listen_addr: String,
}

impl StatusServer {
    /// Create a new status server
    pub fn new(
        controller: Arc<FailoverController>,
        metrics: Option<Arc<MetricsRegistry>>,
        listen_addr: String,
    ) -> Self {
        Self {
            state: AppState {
                controller,
                metrics,
            },
            listen_addr,
        }
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(dashboard_handler))
            .route("/status", get(status_handler))
            .route("/metrics", get(metrics_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.state.clone())
    }

    /// Bind the listen address and serve until the task is dropped
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(listen_addr = %self.listen_addr, "Starting status HTTP server");

        let listener = TcpListener::bind(&self.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(local_addr = ?listener.local_addr().ok(), "Status server listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Handler for `/`
async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.controller.snapshot().await;
    Html(dashboard::render(&snapshot, SystemTime::now()))
}

/// Handler for `/status`
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        cluster: state.controller.snapshot().await,
    })
}

/// Handler for `/metrics`
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(registry) = state.metrics else {
        return (StatusCode::NOT_FOUND, "Metrics disabled").into_response();
    };

    match registry.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
