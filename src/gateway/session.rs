//! Session snapshot reader.
//!
//! Webhook deliveries and REST session fetches carry the same facts in two
//! different shapes. Both are flattened here into one `ExternalSession` so the
//! reconciler never branches on payload shape. The snapshot is built per
//! webhook or poll and never persisted; it informs, but is not, the system of
//! record.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::gateway::types::{
    BriqSession, BriqTransactionStatus, EventKind, GatewayAmount, OrderStatus, SessionItem,
    SettlementPayload, TransactionPayload, WebhookBody,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The payload carried no transaction data for its event kind anywhere.
    /// Partial webhooks are never guessed at.
    #[error("no transaction data present in {event} payload for session {session_id}")]
    MissingTransactionData {
        session_id: String,
        event: EventKind,
    },
}

/// One transaction, capture or refund fact as the gateway stated it. Fields
/// the delivery did not carry stay `None`; the reconciler falls back to
/// order-level values and never invents one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionRecord {
    pub id: Option<String>,
    pub status: Option<BriqTransactionStatus>,
    pub amount_inc_vat: Option<i64>,
    pub currency: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Normalized snapshot of gateway state for one session.
#[derive(Debug, Clone, Default)]
pub struct ExternalSession {
    pub session_id: String,
    pub order_status: OrderStatus,
    pub order_amount: Option<GatewayAmount>,
    pub authorization: Option<TransactionRecord>,
    pub captures: Vec<TransactionRecord>,
    pub refunds: Vec<TransactionRecord>,
    pub items: Vec<SessionItem>,
}

impl ExternalSession {
    /// Normalize a full session object fetched from the REST API.
    pub fn from_session(session: &BriqSession) -> Self {
        let order = &session.order;
        Self {
            session_id: session.session_id.clone(),
            order_status: order.status,
            order_amount: order.amount_inc_vat.zip(order.currency.clone()).map(
                |(amount_inc_vat, currency)| GatewayAmount {
                    amount_inc_vat,
                    currency,
                },
            ),
            authorization: order.transaction.as_ref().map(record_from_transaction),
            captures: order.captures.iter().map(record_from_settlement).collect(),
            refunds: order.refunds.iter().map(record_from_settlement).collect(),
            items: order.items.clone(),
        }
    }

    /// Normalize a minimal webhook body.
    ///
    /// Extraction is order-preferring: the top-level `transaction` field wins;
    /// if absent, the sub-object matching the event kind is consulted, first
    /// its nested `transaction`, then its own fields. The record's own status
    /// beats the event-level `status`; event-level identifiers fill in when
    /// the record lacks its own.
    pub fn from_webhook(body: &WebhookBody) -> Result<Self, SnapshotError> {
        let order_amount = body.amount_inc_vat.zip(body.currency.clone()).map(
            |(amount_inc_vat, currency)| GatewayAmount {
                amount_inc_vat,
                currency,
            },
        );

        let mut snapshot = ExternalSession {
            session_id: body.session_id.clone(),
            // Capture/refund deliveries do not state the order status; the
            // reconciler does not read it on those paths, so Pending is safe.
            order_status: OrderStatus::Pending,
            order_amount,
            ..Default::default()
        };

        match body.event {
            EventKind::OrderStatus => {
                if body.transaction.is_none() && body.status.is_none() {
                    return Err(SnapshotError::MissingTransactionData {
                        session_id: body.session_id.clone(),
                        event: body.event,
                    });
                }
                snapshot.order_status = body
                    .status
                    .as_deref()
                    .map(OrderStatus::parse_lossy)
                    .unwrap_or(OrderStatus::Pending);
                snapshot.authorization = body.transaction.as_ref().map(record_from_transaction);
            }
            EventKind::CaptureStatus => {
                let record = extract_settlement_record(body, body.capture.as_ref())?;
                snapshot.captures.push(apply_event_fallbacks(
                    record,
                    body.status.as_deref(),
                    body.capture_id.as_deref(),
                ));
            }
            EventKind::RefundStatus => {
                let record = extract_settlement_record(body, body.refund.as_ref())?;
                snapshot.refunds.push(apply_event_fallbacks(
                    record,
                    body.status.as_deref(),
                    body.refund_id.as_deref(),
                ));
            }
        }

        Ok(snapshot)
    }

    /// The capture record for the given id. Minimal webhook records may carry
    /// no id of their own; a lone anonymous record matches any id.
    pub fn capture_record(&self, capture_id: &str) -> Option<&TransactionRecord> {
        find_record(&self.captures, capture_id)
    }

    pub fn refund_record(&self, refund_id: &str) -> Option<&TransactionRecord> {
        find_record(&self.refunds, refund_id)
    }
}

fn find_record<'a>(records: &'a [TransactionRecord], id: &str) -> Option<&'a TransactionRecord> {
    records
        .iter()
        .find(|record| record.id.as_deref() == Some(id))
        .or_else(|| match records {
            [only] if only.id.is_none() => Some(only),
            _ => None,
        })
}

fn record_from_transaction(tx: &TransactionPayload) -> TransactionRecord {
    TransactionRecord {
        id: tx.id.clone(),
        status: tx.status,
        amount_inc_vat: tx.amount_inc_vat,
        currency: tx.currency.clone(),
        created_at: tx.created_at,
    }
}

fn record_from_settlement(settlement: &SettlementPayload) -> TransactionRecord {
    // A nested transaction record wins over the sub-object's own fields,
    // field by field.
    let nested = settlement.transaction.as_ref();
    TransactionRecord {
        id: nested
            .and_then(|tx| tx.id.clone())
            .or_else(|| settlement.id.clone()),
        status: nested.and_then(|tx| tx.status).or(settlement.status),
        amount_inc_vat: nested
            .and_then(|tx| tx.amount_inc_vat)
            .or(settlement.amount_inc_vat),
        currency: nested
            .and_then(|tx| tx.currency.clone())
            .or_else(|| settlement.currency.clone()),
        created_at: nested.and_then(|tx| tx.created_at).or(settlement.created_at),
    }
}

fn extract_settlement_record(
    body: &WebhookBody,
    sub_object: Option<&SettlementPayload>,
) -> Result<TransactionRecord, SnapshotError> {
    if let Some(tx) = body.transaction.as_ref() {
        return Ok(record_from_transaction(tx));
    }
    if let Some(settlement) = sub_object {
        return Ok(record_from_settlement(settlement));
    }
    Err(SnapshotError::MissingTransactionData {
        session_id: body.session_id.clone(),
        event: body.event,
    })
}

fn apply_event_fallbacks(
    mut record: TransactionRecord,
    event_status: Option<&str>,
    event_id: Option<&str>,
) -> TransactionRecord {
    if record.status.is_none() {
        record.status = event_status.map(BriqTransactionStatus::parse_lossy);
    }
    if record.id.is_none() {
        record.id = event_id.map(str::to_string);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn webhook(value: serde_json::Value) -> WebhookBody {
        serde_json::from_value(value).expect("webhook body should deserialize")
    }

    #[test]
    fn order_webhook_reads_order_status_and_authorization() {
        let body = webhook(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "ApprovedNotCaptured",
            "transaction": {"id": "auth-1", "status": "Approved", "amountIncVat": 5000, "currency": "EUR"}
        }));

        let snapshot = ExternalSession::from_webhook(&body).expect("extraction should succeed");
        assert_eq!(snapshot.order_status, OrderStatus::ApprovedNotCaptured);
        let auth = snapshot.authorization.expect("authorization present");
        assert_eq!(auth.status, Some(BriqTransactionStatus::Approved));
        assert_eq!(auth.amount_inc_vat, Some(5000));
    }

    #[test]
    fn order_webhook_without_transaction_uses_order_level_facts() {
        let body = webhook(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "Rejected",
            "amountIncVat": 2000,
            "currency": "SEK"
        }));

        let snapshot = ExternalSession::from_webhook(&body).expect("extraction should succeed");
        assert_eq!(snapshot.order_status, OrderStatus::Rejected);
        assert!(snapshot.authorization.is_none());
        assert_eq!(
            snapshot.order_amount,
            Some(GatewayAmount {
                amount_inc_vat: 2000,
                currency: "SEK".to_string()
            })
        );
    }

    #[test]
    fn capture_webhook_prefers_top_level_transaction() {
        let body = webhook(json!({
            "sessionId": "sess-1",
            "event": "capture_status",
            "status": "Approved",
            "captureId": "cap-1",
            "transaction": {"amountIncVat": 5000, "currency": "EUR"},
            "capture": {"id": "cap-other", "amountIncVat": 999, "currency": "USD"}
        }));

        let snapshot = ExternalSession::from_webhook(&body).expect("extraction should succeed");
        let record = snapshot.capture_record("cap-1").expect("record present");
        assert_eq!(record.amount_inc_vat, Some(5000));
        assert_eq!(record.currency.as_deref(), Some("EUR"));
        // Event-level fallbacks fill the gaps the record left.
        assert_eq!(record.status, Some(BriqTransactionStatus::Approved));
        assert_eq!(record.id.as_deref(), Some("cap-1"));
    }

    #[test]
    fn capture_webhook_falls_back_to_nested_capture_object() {
        let body = webhook(json!({
            "sessionId": "sess-1",
            "event": "capture_status",
            "captureId": "cap-2",
            "capture": {
                "id": "cap-2",
                "transaction": {"status": "Approved", "amountIncVat": 1500, "currency": "EUR"}
            }
        }));

        let snapshot = ExternalSession::from_webhook(&body).expect("extraction should succeed");
        let record = snapshot.capture_record("cap-2").expect("record present");
        assert_eq!(record.status, Some(BriqTransactionStatus::Approved));
        assert_eq!(record.amount_inc_vat, Some(1500));
    }

    #[test]
    fn refund_webhook_without_any_record_fails() {
        let body = webhook(json!({
            "sessionId": "sess-1",
            "event": "refund_status",
            "refundId": "ref-1"
        }));

        let result = ExternalSession::from_webhook(&body);
        assert!(matches!(
            result,
            Err(SnapshotError::MissingTransactionData { .. })
        ));
    }

    #[test]
    fn full_session_normalizes_captures_and_refunds() {
        let session: BriqSession = serde_json::from_value(json!({
            "sessionId": "sess-9",
            "order": {
                "status": "ApprovedNotCaptured",
                "amountIncVat": 10000,
                "currency": "EUR",
                "transaction": {"id": "auth-9", "status": "Approved"},
                "captures": [
                    {"id": "cap-9", "status": "Approved", "amountIncVat": 4000, "currency": "EUR"}
                ],
                "refunds": [
                    {"id": "ref-9", "transaction": {"status": "Pending", "amountIncVat": 1000, "currency": "EUR"}}
                ],
                "items": [
                    {"reference": "sku-1", "name": "Widget", "quantity": 2, "unitPrice": 5000}
                ]
            }
        }))
        .expect("session should deserialize");

        let snapshot = ExternalSession::from_session(&session);
        assert_eq!(snapshot.order_status, OrderStatus::ApprovedNotCaptured);
        assert_eq!(snapshot.captures.len(), 1);
        assert_eq!(
            snapshot.refund_record("ref-9").and_then(|r| r.amount_inc_vat),
            Some(1000)
        );
        assert_eq!(snapshot.items.len(), 1);
    }

    #[test]
    fn anonymous_single_record_matches_any_id() {
        let records = vec![TransactionRecord {
            id: None,
            amount_inc_vat: Some(100),
            ..Default::default()
        }];
        assert!(find_record(&records, "cap-x").is_some());

        let two = vec![TransactionRecord::default(), TransactionRecord::default()];
        assert!(find_record(&two, "cap-x").is_none());
    }
}
