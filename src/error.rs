//! Unified error handling.
//!
//! Layer errors (signature, webhook pipeline, session sync, configuration)
//! are folded into one [`AppError`] with an HTTP status, a machine-readable
//! code and a user-facing message. Webhook handlers lean on the status: any
//! non-2xx tells the gateway to redeliver.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;
use crate::gateway::client::GatewayError;
use crate::gateway::signature::SignatureError;
use crate::platform::client::PlatformError;
use crate::services::session_sync::SyncError;
use crate::services::webhook_processor::WebhookError;

/// Machine-readable error codes for client handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,
    #[serde(rename = "INVALID_PAYLOAD")]
    InvalidPayload,
    #[serde(rename = "MISSING_LOCALE")]
    MissingLocale,
    #[serde(rename = "CART_NOT_FOUND")]
    CartNotFound,
    #[serde(rename = "VERSION_CONFLICT")]
    VersionConflict,
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    #[serde(rename = "PLATFORM_ERROR")]
    PlatformError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

#[derive(Debug)]
pub enum AppErrorKind {
    Signature(SignatureError),
    /// The request body could not be parsed into a known shape.
    Payload(String),
    Webhook(WebhookError),
    Sync(SyncError),
    Config(ConfigError),
    Internal(String),
}

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Payload(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal(message.into()))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Signature(_) => 401,
            AppErrorKind::Payload(_) => 400,
            AppErrorKind::Webhook(err) => match err {
                WebhookError::Route(_) | WebhookError::Snapshot(_) | WebhookError::Reconcile(_) => {
                    400
                }
                WebhookError::Platform(PlatformError::VersionConflict { .. }) => 409,
                WebhookError::Platform(err) if err.is_retryable() => 502,
                WebhookError::Platform(_) => 500,
            },
            AppErrorKind::Sync(err) => match err {
                SyncError::MissingLocale { .. } => 400,
                SyncError::BindingConflict { .. } => 409,
                SyncError::Platform(PlatformError::NotFound { .. }) => 404,
                SyncError::Platform(PlatformError::VersionConflict { .. }) => 409,
                SyncError::Gateway(GatewayError::SessionNotFound(_)) => 404,
                SyncError::Gateway(_) | SyncError::Platform(_) => 502,
            },
            AppErrorKind::Config(_) | AppErrorKind::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Signature(_) => ErrorCode::InvalidSignature,
            AppErrorKind::Payload(_) => ErrorCode::InvalidPayload,
            AppErrorKind::Webhook(err) => match err {
                WebhookError::Route(_) | WebhookError::Snapshot(_) | WebhookError::Reconcile(_) => {
                    ErrorCode::InvalidPayload
                }
                WebhookError::Platform(PlatformError::VersionConflict { .. }) => {
                    ErrorCode::VersionConflict
                }
                WebhookError::Platform(_) => ErrorCode::PlatformError,
            },
            AppErrorKind::Sync(err) => match err {
                SyncError::MissingLocale { .. } => ErrorCode::MissingLocale,
                SyncError::BindingConflict { .. } => ErrorCode::VersionConflict,
                SyncError::Platform(PlatformError::NotFound { .. }) => ErrorCode::CartNotFound,
                SyncError::Platform(PlatformError::VersionConflict { .. }) => {
                    ErrorCode::VersionConflict
                }
                SyncError::Platform(_) => ErrorCode::PlatformError,
                SyncError::Gateway(_) => ErrorCode::GatewayError,
            },
            AppErrorKind::Config(_) => ErrorCode::ConfigurationError,
            AppErrorKind::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Signature(_) => "Webhook signature verification failed".to_string(),
            AppErrorKind::Payload(message) => format!("Invalid request payload: {}", message),
            AppErrorKind::Webhook(err) => err.to_string(),
            AppErrorKind::Sync(err) => err.to_string(),
            AppErrorKind::Config(err) => err.to_string(),
            AppErrorKind::Internal(_) => {
                "An internal server error occurred. Please try again later.".to_string()
            }
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Signature(_) | AppErrorKind::Payload(_) | AppErrorKind::Config(_) => {
                false
            }
            AppErrorKind::Webhook(err) => err.is_retryable(),
            AppErrorKind::Sync(err) => match err {
                SyncError::MissingLocale { .. } => false,
                SyncError::BindingConflict { .. } => true,
                SyncError::Gateway(err) => err.is_retryable(),
                SyncError::Platform(err) => err.is_retryable(),
            },
            AppErrorKind::Internal(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AppErrorKind::Signature(err) => write!(f, "signature verification failed: {}", err),
            AppErrorKind::Payload(message) => write!(f, "invalid payload: {}", message),
            AppErrorKind::Webhook(err) => write!(f, "webhook processing failed: {}", err),
            AppErrorKind::Sync(err) => write!(f, "session sync failed: {}", err),
            AppErrorKind::Config(err) => write!(f, "configuration error: {}", err),
            AppErrorKind::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for AppError {}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::new(AppErrorKind::Signature(err))
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        AppError::new(AppErrorKind::Webhook(err))
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        AppError::new(AppErrorKind::Sync(err))
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(AppErrorKind::Config(err))
    }
}
