//! HTTP surface: webhook intake and session resolution.

pub mod notifications;
pub mod sessions;

use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;

use crate::health::{HealthStatus, ReadinessStatus};
use crate::services::session_sync::SessionSyncManager;
use crate::services::webhook_processor::WebhookProcessor;

#[derive(Clone)]
pub struct AppState {
    /// Shared webhook secret; `None` disables webhook processing.
    pub webhook_secret: Option<Arc<Vec<u8>>>,
    pub signature_tolerance: Duration,
    pub processor: Arc<WebhookProcessor>,
    pub session_sync: Arc<SessionSyncManager>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/notifications", post(notifications::handle_notification))
        .route("/sessions", post(sessions::resolve_session))
        .with_state(state)
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}

async fn readiness(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<ReadinessStatus> {
    Json(ReadinessStatus::new(state.webhook_secret.is_some()))
}
