//! Webhook intake endpoint.
//!
//! `POST /notifications` verifies the signature against the raw body before
//! any parsing, then hands the delivery to the processor. A 200 with
//! `{"status":"ok"}` acknowledges the delivery; any non-2xx makes the
//! gateway redeliver later.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::api::AppState;
use crate::error::AppError;
use crate::gateway::signature;
use crate::gateway::types::WebhookBody;
use crate::middleware::logging::request_id_from_headers;

pub const SIGNATURE_HEADER: &str = "x-briq-signature";

pub async fn handle_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = request_id_from_headers(&headers);
    let tag = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    // Verification runs on the raw bytes; an absent header verifies as an
    // empty one and fails.
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    signature::verify(
        &body,
        signature_header,
        state.webhook_secret.as_deref().map(|s| s.as_slice()),
        state.signature_tolerance,
    )
    .map_err(|err| tag(err.into()))?;

    let payload: WebhookBody =
        serde_json::from_slice(&body).map_err(|err| tag(AppError::payload(err.to_string())))?;
    debug!(session_id = %payload.session_id, event = %payload.event, "webhook accepted");

    state
        .processor
        .process(&payload)
        .await
        .map_err(|err| tag(err.into()))?;

    Ok(Json(json!({ "status": "ok" })))
}
