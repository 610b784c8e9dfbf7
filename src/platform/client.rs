//! Commerce-platform client.
//!
//! Narrow trait over the platform's cart and payment endpoints. Every record
//! is versioned; mutations submit the version they read and the platform
//! serializes conflicting writes, surfacing a version conflict the caller can
//! re-read on. `NotFound` and `VersionConflict` are distinguished from other
//! upstream failures because the callers treat them differently.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use thiserror::Error;

use crate::gateway::http::{Auth, HttpClient, HttpError};
use crate::platform::types::{Cart, Payment, PaymentDraft, PaymentUpdateAction};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
    #[error("version conflict updating {resource} {id}")]
    VersionConflict { resource: &'static str, id: String },
    #[error("platform call failed: {0}")]
    Upstream(#[from] HttpError),
}

impl PlatformError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::NotFound { .. } => false,
            // A conflict resolves on re-read, so the delivery is worth
            // redelivering.
            PlatformError::VersionConflict { .. } => true,
            PlatformError::Upstream(err) => err.is_retryable(),
        }
    }
}

/// The platform operations this service consumes.
#[async_trait]
pub trait CommercePlatform: Send + Sync {
    async fn get_cart(&self, cart_id: &str) -> Result<Cart, PlatformError>;

    /// The payment whose interface id equals the gateway session id, if one
    /// exists yet.
    async fn find_payment_by_interface_id(
        &self,
        session_id: &str,
    ) -> Result<Option<Payment>, PlatformError>;

    async fn create_payment(&self, draft: PaymentDraft) -> Result<Payment, PlatformError>;

    async fn update_payment(
        &self,
        payment_id: &str,
        version: u64,
        actions: Vec<PaymentUpdateAction>,
    ) -> Result<Payment, PlatformError>;

    async fn set_cart_custom_type(
        &self,
        cart_id: &str,
        version: u64,
        type_key: &str,
        fields: JsonValue,
    ) -> Result<Cart, PlatformError>;

    async fn set_cart_custom_field(
        &self,
        cart_id: &str,
        version: u64,
        name: &str,
        value: JsonValue,
    ) -> Result<Cart, PlatformError>;
}

#[derive(Debug, Clone)]
pub struct PlatformClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

pub struct PlatformClient {
    config: PlatformClientConfig,
    http: HttpClient,
    auth: Auth,
}

impl PlatformClient {
    pub fn new(config: PlatformClientConfig) -> Result<Self, PlatformError> {
        let http = HttpClient::new(
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        let auth = Auth::Bearer(config.api_key.clone());
        Ok(Self { config, http, auth })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_error(err: HttpError, resource: &'static str, id: &str) -> PlatformError {
        match err.status() {
            Some(404) => PlatformError::NotFound {
                resource,
                id: id.to_string(),
            },
            Some(409) => PlatformError::VersionConflict {
                resource,
                id: id.to_string(),
            },
            _ => PlatformError::Upstream(err),
        }
    }
}

/// Response envelope of the payment query endpoint.
#[derive(Debug, serde::Deserialize)]
struct PaymentPage {
    #[serde(default)]
    results: Vec<Payment>,
}

#[async_trait]
impl CommercePlatform for PlatformClient {
    async fn get_cart(&self, cart_id: &str) -> Result<Cart, PlatformError> {
        self.http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/carts/{}", cart_id)),
                Some(&self.auth),
                None,
            )
            .await
            .map_err(|e| Self::map_error(e, "cart", cart_id))
    }

    async fn find_payment_by_interface_id(
        &self,
        session_id: &str,
    ) -> Result<Option<Payment>, PlatformError> {
        let page: PaymentPage = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/payments?interfaceId={}", session_id)),
                Some(&self.auth),
                None,
            )
            .await
            .map_err(|e| Self::map_error(e, "payment", session_id))?;
        Ok(page.results.into_iter().next())
    }

    async fn create_payment(&self, draft: PaymentDraft) -> Result<Payment, PlatformError> {
        let body = serde_json::to_value(&draft).map_err(|e| {
            PlatformError::Upstream(HttpError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        self.http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payments"),
                Some(&self.auth),
                Some(&body),
            )
            .await
            .map_err(|e| Self::map_error(e, "payment", &draft.interface_id))
    }

    async fn update_payment(
        &self,
        payment_id: &str,
        version: u64,
        actions: Vec<PaymentUpdateAction>,
    ) -> Result<Payment, PlatformError> {
        let body = json!({ "version": version, "actions": actions });
        self.http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/payments/{}", payment_id)),
                Some(&self.auth),
                Some(&body),
            )
            .await
            .map_err(|e| Self::map_error(e, "payment", payment_id))
    }

    async fn set_cart_custom_type(
        &self,
        cart_id: &str,
        version: u64,
        type_key: &str,
        fields: JsonValue,
    ) -> Result<Cart, PlatformError> {
        let body = json!({
            "version": version,
            "actions": [{
                "action": "setCustomType",
                "type": { "key": type_key },
                "fields": fields
            }]
        });
        self.http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/carts/{}", cart_id)),
                Some(&self.auth),
                Some(&body),
            )
            .await
            .map_err(|e| Self::map_error(e, "cart", cart_id))
    }

    async fn set_cart_custom_field(
        &self,
        cart_id: &str,
        version: u64,
        name: &str,
        value: JsonValue,
    ) -> Result<Cart, PlatformError> {
        let body = json!({
            "version": version,
            "actions": [{
                "action": "setCustomField",
                "name": name,
                "value": value
            }]
        });
        self.http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/carts/{}", cart_id)),
                Some(&self.auth),
                Some(&body),
            )
            .await
            .map_err(|e| Self::map_error(e, "cart", cart_id))
    }
}
