//! Health endpoints: liveness plus a readiness report that states whether
//! webhook processing is enabled.

use serde::Serialize;

/// Liveness response for `GET /health`.
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Readiness response for `GET /health/ready`. Webhook processing is off
/// when no webhook secret is configured; the service still serves session
/// resolution in that state.
#[derive(Debug, Serialize, Clone)]
pub struct ReadinessStatus {
    pub status: &'static str,
    pub webhooks_enabled: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ReadinessStatus {
    pub fn new(webhooks_enabled: bool) -> Self {
        Self {
            status: "ready",
            webhooks_enabled,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_reports_package_identity() {
        let status = HealthStatus::ok();
        assert_eq!(status.status, "ok");
        assert!(!status.version.is_empty());
    }

    #[test]
    fn readiness_reflects_webhook_configuration() {
        assert!(ReadinessStatus::new(true).webhooks_enabled);
        assert!(!ReadinessStatus::new(false).webhooks_enabled);
    }
}
