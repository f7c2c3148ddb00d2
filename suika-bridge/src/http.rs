//! HTTP server for the snapshot payloads.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use suika_common::Uptime;

use crate::commands::BridgeCommand;
use crate::payload::{DiagnosticPayload, MetricsPayload, StatusPayload};
use crate::snapshot::SnapshotReader;
use crate::staleness::is_stale;

const NO_CACHE: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "-1"),
];

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    reader: SnapshotReader,
    commands: mpsc::Sender<BridgeCommand>,
    uptime: Uptime,
    advertise_ip: Arc<str>,
    stale_timeout_ms: u64,
}

impl AppState {
    pub fn new(
        reader: SnapshotReader,
        commands: mpsc::Sender<BridgeCommand>,
        uptime: Uptime,
        advertise_ip: impl Into<Arc<str>>,
        stale_timeout_ms: u64,
    ) -> Self {
        Self {
            reader,
            commands,
            uptime,
            advertise_ip: advertise_ip.into(),
            stale_timeout_ms,
        }
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(data_handler))
        .route("/status", get(status_handler))
        .route("/raw", get(raw_handler))
        .route("/health", get(health_handler))
        .route("/reset", post(reset_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn no_cache_json<T: Serialize>(payload: T) -> Response {
    (StatusCode::OK, NO_CACHE, Json(payload)).into_response()
}

/// Handler for the /data endpoint.
async fn data_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.reader.load();
    no_cache_json(MetricsPayload::render(&snapshot.snapshot, state.uptime.millis()))
}

/// Handler for the /status endpoint.
async fn status_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.reader.load();
    no_cache_json(StatusPayload::render(
        &snapshot,
        state.uptime.millis(),
        &state.advertise_ip,
    ))
}

/// Handler for the /raw endpoint.
async fn raw_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.reader.load();
    no_cache_json(DiagnosticPayload::render(&snapshot, state.uptime.millis()))
}

/// Handler for the /health endpoint.
async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.reader.load();
    let now = state.uptime.millis();

    if !snapshot.has_valid_data {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            NO_CACHE,
            "not ready - no sensor data received yet\n",
        )
            .into_response()
    } else if is_stale(&snapshot.snapshot, now, state.stale_timeout_ms) {
        (StatusCode::SERVICE_UNAVAILABLE, NO_CACHE, "stale\n").into_response()
    } else {
        (StatusCode::OK, NO_CACHE, "fresh\n").into_response()
    }
}

/// Handler for the /reset endpoint.
async fn reset_handler(State(state): State<AppState>) -> Response {
    match state.commands.try_send(BridgeCommand::Reset) {
        Ok(()) => {
            debug!("Reset command queued");
            (StatusCode::ACCEPTED, NO_CACHE, "reset queued\n").into_response()
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Command queue full, reset not queued");
            (StatusCode::SERVICE_UNAVAILABLE, NO_CACHE, "busy\n").into_response()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            NO_CACHE,
            "ingestion stopped\n",
        )
            .into_response(),
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    state: AppState,
    listen_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(state: AppState, listen_addr: SocketAddr) -> Self {
        Self { state, listen_addr }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(addr = %self.listen_addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
