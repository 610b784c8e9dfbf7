//! Session resolution endpoint for the storefront checkout.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::logging::request_id_from_headers;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub cart_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub amount_inc_vat: Option<i64>,
    pub currency: Option<String>,
}

/// `POST /sessions`: resolve the live gateway session for a cart, creating
/// or patching it as needed.
pub async fn resolve_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let request_id = request_id_from_headers(&headers);
    let tag = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    if request.cart_id.trim().is_empty() {
        return Err(tag(AppError::payload("cartId is required")));
    }

    let session = state
        .session_sync
        .resolve_for_cart(&request.cart_id)
        .await
        .map_err(|err| tag(err.into()))?;

    Ok(Json(SessionResponse {
        session_id: session.session_id.clone(),
        amount_inc_vat: session.order.amount_inc_vat,
        currency: session.order.currency.clone(),
    }))
}
