//! The Briq REST API client: session lifecycle plus the order capture, refund
//! and cancel actions, all Basic-authenticated.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::gateway::http::{Auth, HttpClient, HttpError};
use crate::gateway::types::{
    BriqSession, CreateSessionRequest, OrderActionRequest, OrderActionResponse,
    UpdateSessionRequest,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("session {0} not found at gateway")]
    SessionNotFound(String),
    #[error("gateway call failed: {0}")]
    Upstream(#[from] HttpError),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::SessionNotFound(_) => false,
            GatewayError::Upstream(err) => err.is_retryable(),
        }
    }
}

/// The gateway operations this service consumes. Injected as
/// `Arc<dyn GatewayApi>` so tests can substitute a fake.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<BriqSession, GatewayError>;

    async fn update_session(
        &self,
        session_id: &str,
        request: UpdateSessionRequest,
    ) -> Result<BriqSession, GatewayError>;

    async fn get_session(&self, session_id: &str) -> Result<BriqSession, GatewayError>;

    async fn capture_order(
        &self,
        session_id: &str,
        request: OrderActionRequest,
    ) -> Result<OrderActionResponse, GatewayError>;

    async fn refund_order(
        &self,
        session_id: &str,
        request: OrderActionRequest,
    ) -> Result<OrderActionResponse, GatewayError>;

    async fn cancel_order(&self, session_id: &str) -> Result<OrderActionResponse, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct BriqClientConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

pub struct BriqClient {
    config: BriqClientConfig,
    http: HttpClient,
    auth: Auth,
}

impl BriqClient {
    pub fn new(config: BriqClientConfig) -> Result<Self, GatewayError> {
        let http = HttpClient::new(
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        let auth = Auth::Basic {
            username: config.username.clone(),
            password: config.password.clone(),
        };
        Ok(Self { config, http, auth })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        session_id: &str,
        path: &str,
        body: Option<&JsonValue>,
    ) -> Result<T, GatewayError> {
        self.http
            .request_json(method, &self.endpoint(path), Some(&self.auth), body)
            .await
            .map_err(|err| match err.status() {
                Some(404) => GatewayError::SessionNotFound(session_id.to_string()),
                _ => GatewayError::Upstream(err),
            })
    }
}

#[async_trait]
impl GatewayApi for BriqClient {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<BriqSession, GatewayError> {
        let body = serde_json::to_value(&request).map_err(|e| {
            GatewayError::Upstream(HttpError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        let session: BriqSession = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/session"),
                Some(&self.auth),
                Some(&body),
            )
            .await?;
        info!(session_id = %session.session_id, "gateway session created");
        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        request: UpdateSessionRequest,
    ) -> Result<BriqSession, GatewayError> {
        let body = serde_json::to_value(&request).map_err(|e| {
            GatewayError::Upstream(HttpError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        let session: BriqSession = self
            .request(
                reqwest::Method::PATCH,
                session_id,
                &format!("/session/{}", session_id),
                Some(&body),
            )
            .await?;
        info!(session_id = %session_id, "gateway session updated");
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<BriqSession, GatewayError> {
        self.request(
            reqwest::Method::GET,
            session_id,
            &format!("/session/{}", session_id),
            None,
        )
        .await
    }

    async fn capture_order(
        &self,
        session_id: &str,
        request: OrderActionRequest,
    ) -> Result<OrderActionResponse, GatewayError> {
        let body = serde_json::to_value(&request).map_err(|e| {
            GatewayError::Upstream(HttpError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        self.request(
            reqwest::Method::POST,
            session_id,
            &format!("/session/{}/order/capture", session_id),
            Some(&body),
        )
        .await
    }

    async fn refund_order(
        &self,
        session_id: &str,
        request: OrderActionRequest,
    ) -> Result<OrderActionResponse, GatewayError> {
        let body = serde_json::to_value(&request).map_err(|e| {
            GatewayError::Upstream(HttpError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        self.request(
            reqwest::Method::POST,
            session_id,
            &format!("/session/{}/order/refund", session_id),
            Some(&body),
        )
        .await
    }

    async fn cancel_order(&self, session_id: &str) -> Result<OrderActionResponse, GatewayError> {
        self.request(
            reqwest::Method::POST,
            session_id,
            &format!("/session/{}/order/cancel", session_id),
            None,
        )
        .await
    }
}
