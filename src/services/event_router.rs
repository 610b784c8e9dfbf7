//! Webhook event routing.
//!
//! Every delivery names one of three event kinds. The match is exhaustive so
//! a new kind added to `EventKind` fails compilation here instead of being
//! dropped at runtime.

use thiserror::Error;

use crate::gateway::types::{EventKind, SettlementPayload, WebhookBody};

/// A routed event, carrying the identifiers the reconciler keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Order-level status change; keyed by the session id.
    Order { session_id: String },
    /// Capture settlement outcome; keyed by the capture id.
    Capture {
        session_id: String,
        capture_id: String,
    },
    /// Refund settlement outcome; keyed by the refund id.
    Refund {
        session_id: String,
        refund_id: String,
    },
}

impl ReconcileEvent {
    pub fn session_id(&self) -> &str {
        match self {
            ReconcileEvent::Order { session_id }
            | ReconcileEvent::Capture { session_id, .. }
            | ReconcileEvent::Refund { session_id, .. } => session_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    /// A settlement event arrived without the identifier it is keyed by.
    #[error("{event} delivery for session {session_id} carries no settlement id")]
    MissingIdentifier {
        session_id: String,
        event: EventKind,
    },
}

/// Route a delivery to its reconcile event.
pub fn route(body: &WebhookBody) -> Result<ReconcileEvent, RouteError> {
    match body.event {
        EventKind::OrderStatus => Ok(ReconcileEvent::Order {
            session_id: body.session_id.clone(),
        }),
        EventKind::CaptureStatus => Ok(ReconcileEvent::Capture {
            session_id: body.session_id.clone(),
            capture_id: settlement_id(body, body.capture_id.as_deref(), body.capture.as_ref())?,
        }),
        EventKind::RefundStatus => Ok(ReconcileEvent::Refund {
            session_id: body.session_id.clone(),
            refund_id: settlement_id(body, body.refund_id.as_deref(), body.refund.as_ref())?,
        }),
    }
}

/// The settlement id from the event-level field, else the sub-object, else
/// its nested transaction record.
fn settlement_id(
    body: &WebhookBody,
    event_id: Option<&str>,
    sub_object: Option<&SettlementPayload>,
) -> Result<String, RouteError> {
    event_id
        .map(str::to_string)
        .or_else(|| sub_object.and_then(|s| s.id.clone()))
        .or_else(|| {
            sub_object
                .and_then(|s| s.transaction.as_ref())
                .and_then(|tx| tx.id.clone())
        })
        .or_else(|| body.transaction.as_ref().and_then(|tx| tx.id.clone()))
        .ok_or(RouteError::MissingIdentifier {
            session_id: body.session_id.clone(),
            event: body.event,
        })
}
