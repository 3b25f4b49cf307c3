//! `ParleyServer`: Axum HTTP + WebSocket server.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::hub::{Hub, HubHandle};
use crate::identity::IdentityResolver;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::upgrade::ws_chat_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Dispatch and membership API.
    pub hub: HubHandle,
    /// Identity boundary for upgrades.
    pub identity: Arc<dyn IdentityResolver>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The parley server: one hub plus its HTTP surface.
pub struct ParleyServer {
    config: Arc<ServerConfig>,
    identity: Arc<dyn IdentityResolver>,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    shutdown: ShutdownCoordinator,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl ParleyServer {
    /// Create the server and start its hub. Must be called inside a Tokio runtime.
    pub fn new(
        config: ServerConfig,
        identity: impl IdentityResolver,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let shutdown = ShutdownCoordinator::new();
        let (hub, hub_task) = Hub::spawn(config.hub.clone(), shutdown.token());
        Self {
            config: Arc::new(config),
            identity: Arc::new(identity),
            hub,
            hub_task,
            shutdown,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            identity: self.identity.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/v1/ws/chat", get(ws_chat_handler))
            .route("/api/v1/ws/stats", get(stats_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %err, "http server failed");
            }
        });
        info!(%addr, "listening");
        Ok((addr, task))
    }

    /// Cancel everything and wait for the hub and `server_task` to finish.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn stop(self, server_task: JoinHandle<()>, timeout: Option<Duration>) -> bool {
        info!("shutting down");
        self.shutdown
            .graceful_shutdown(vec![self.hub_task, server_task], timeout)
            .await
    }

    /// The hub's dispatch API, for the code that produces messages.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.hub.stats().await.ok();
    Json(health::health_check(state.start_time, stats))
}

/// GET /api/v1/ws/stats
async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": err.to_string(), "code": "HUB_CLOSED" })),
        )
            .into_response(),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
