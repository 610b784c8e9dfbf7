//! Webhook processor.
//!
//! Runs a verified delivery through the pipeline: route the event, normalize
//! the payload into a snapshot, plan the reconciliation against the current
//! payment, then execute the plan. The payload is trusted as delivered; the
//! HMAC check upstream already established it came from the gateway.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::session::{ExternalSession, SnapshotError};
use crate::gateway::types::WebhookBody;
use crate::platform::client::{CommercePlatform, PlatformError};
use crate::services::event_router::{self, RouteError};
use crate::services::reconciler::{self, ReconcileError, ReconcilePlan, SkipReason};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl WebhookError {
    /// Whether redelivery could succeed. Malformed payloads never will; most
    /// platform failures are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookError::Route(_) | WebhookError::Snapshot(_) | WebhookError::Reconcile(_) => {
                false
            }
            WebhookError::Platform(err) => err.is_retryable(),
        }
    }
}

/// What processing a delivery amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The plan was executed; `writes` counts platform update actions.
    Applied { writes: usize },
    /// The facts were already recorded. Redeliveries land here.
    AlreadyApplied,
    /// A settlement event for a session with no payment, or a payment that
    /// vanished mid-write. Dropped and acknowledged.
    PaymentMissing,
}

pub struct WebhookProcessor {
    platform: Arc<dyn CommercePlatform>,
}

impl WebhookProcessor {
    pub fn new(platform: Arc<dyn CommercePlatform>) -> Self {
        Self { platform }
    }

    pub async fn process(&self, body: &WebhookBody) -> Result<WebhookOutcome, WebhookError> {
        let event = event_router::route(body)?;
        let snapshot = ExternalSession::from_webhook(body)?;
        let session_id = event.session_id().to_string();

        let payment = self
            .platform
            .find_payment_by_interface_id(&session_id)
            .await?;

        let plan = reconciler::plan(payment.as_ref(), &snapshot, &event)?;
        let outcome = self.apply(&session_id, plan).await?;
        info!(
            session_id = %session_id,
            event = %body.event,
            outcome = ?outcome,
            "webhook processed"
        );
        Ok(outcome)
    }

    async fn apply(
        &self,
        session_id: &str,
        plan: ReconcilePlan,
    ) -> Result<WebhookOutcome, WebhookError> {
        match plan {
            ReconcilePlan::CreatePayment(draft) => {
                self.platform.create_payment(draft).await?;
                Ok(WebhookOutcome::Applied { writes: 1 })
            }
            ReconcilePlan::Update {
                payment_id,
                version,
                actions,
            } => {
                let writes = actions.len();
                match self
                    .platform
                    .update_payment(&payment_id, version, actions)
                    .await
                {
                    Ok(_) => Ok(WebhookOutcome::Applied { writes }),
                    // The payment was deleted between lookup and write. The
                    // delivery is acknowledged; there is nothing left to
                    // reconcile against.
                    Err(PlatformError::NotFound { .. }) => {
                        warn!(
                            session_id = %session_id,
                            payment_id = %payment_id,
                            "payment vanished before update, dropping delivery"
                        );
                        Ok(WebhookOutcome::PaymentMissing)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            ReconcilePlan::Skip(SkipReason::AlreadyApplied) => Ok(WebhookOutcome::AlreadyApplied),
            ReconcilePlan::Skip(SkipReason::PaymentMissing) => Ok(WebhookOutcome::PaymentMissing),
        }
    }
}
