//! HTTP listener for the `serve` command.
//!
//! # Endpoints
//!
//! - `GET /health` - aggregated health report and lifecycle state
//! - `POST /events` - queue a content-published event (a document as JSON)

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use sitemapper_core::{ContentConsumer, Document, HealthMonitor, HealthStatus, LifecycleState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    /// Check results served by `/health`.
    pub health: Arc<HealthMonitor>,
    /// Queue behind `/events`.
    pub consumer: Arc<ContentConsumer>,
    /// Current process lifecycle state.
    pub lifecycle: watch::Receiver<LifecycleState>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/events", post(handle_event))
        .with_state(state)
}

/// Serve until `shutdown` fires, then finish in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: oneshot::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "HTTP listener started");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await?;
    info!("HTTP listener stopped");
    Ok(())
}

/// Handle GET /health
async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.health.report();
    let lifecycle = *state.lifecycle.borrow();

    let status = if report.overall_status == HealthStatus::Error
        || lifecycle != LifecycleState::Running
    {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = json!({
        "status": report.overall_status,
        "state": lifecycle.to_string(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": report.checks,
    });
    (status, Json(body))
}

/// Handle POST /events
async fn handle_event(
    State(state): State<AppState>,
    Json(doc): Json<Document>,
) -> (StatusCode, Json<Value>) {
    let uri = doc.uri.clone();
    match state.consumer.submit(doc) {
        Ok(()) => {
            debug!(uri = %uri, "Queued content event");
            (StatusCode::ACCEPTED, Json(json!({ "queued": uri })))
        },
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
