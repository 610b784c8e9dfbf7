//! Briq wire types: the status vocabularies, the webhook body and the session
//! object returned by the gateway's REST API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order-level status of a gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    ApprovedNotCaptured,
    Rejected,
    Cancelled,
    /// Any status this service does not recognize. Kept representable so
    /// status mapping stays total.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::ApprovedNotCaptured => "ApprovedNotCaptured",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Unknown => "Unknown",
        }
    }

    /// Parse a wire status without failing: unrecognized input becomes
    /// `Unknown`, which the mapper treats conservatively.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim() {
            "Pending" => OrderStatus::Pending,
            "ApprovedNotCaptured" => OrderStatus::ApprovedNotCaptured,
            "Rejected" => OrderStatus::Rejected,
            "Cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Unknown,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an individual gateway transaction, capture or refund record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BriqTransactionStatus {
    Approved,
    Pending,
    Rejected,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BriqTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BriqTransactionStatus::Approved => "Approved",
            BriqTransactionStatus::Pending => "Pending",
            BriqTransactionStatus::Rejected => "Rejected",
            BriqTransactionStatus::Cancelled => "Cancelled",
            BriqTransactionStatus::Unknown => "Unknown",
        }
    }

    pub fn parse_lossy(value: &str) -> Self {
        match value.trim() {
            "Approved" => BriqTransactionStatus::Approved,
            "Pending" => BriqTransactionStatus::Pending,
            "Rejected" => BriqTransactionStatus::Rejected,
            "Cancelled" => BriqTransactionStatus::Cancelled,
            _ => BriqTransactionStatus::Unknown,
        }
    }
}

impl fmt::Display for BriqTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of webhook event kinds the gateway delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderStatus,
    CaptureStatus,
    RefundStatus,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderStatus => "order_status",
            EventKind::CaptureStatus => "capture_status",
            EventKind::RefundStatus => "refund_status",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An amount as the gateway states it: minor units including VAT plus an ISO
/// currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayAmount {
    pub amount_inc_vat: i64,
    pub currency: String,
}

/// A transaction record as it appears in webhook bodies and session objects.
/// Every field is optional on the wire; the snapshot reader fills gaps from
/// the event envelope where it can.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<BriqTransactionStatus>,
    #[serde(default)]
    pub amount_inc_vat: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A capture or refund sub-object in a webhook or session payload. Some
/// deliveries nest the transaction record inside it, others state the fields
/// directly on the sub-object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<BriqTransactionStatus>,
    #[serde(default)]
    pub amount_inc_vat: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub transaction: Option<TransactionPayload>,
}

/// Inbound webhook body for `POST /notifications`.
///
/// `status` is event-scoped: for `order_status` events it carries an
/// [`OrderStatus`], for capture/refund events a [`BriqTransactionStatus`].
/// It is kept raw here and parsed by the snapshot reader.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    pub session_id: String,
    pub event: EventKind,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub capture_id: Option<String>,
    #[serde(default)]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub transaction: Option<TransactionPayload>,
    #[serde(default)]
    pub capture: Option<SettlementPayload>,
    #[serde(default)]
    pub refund: Option<SettlementPayload>,
    #[serde(default)]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub amount_inc_vat: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// One order line as the gateway stores it on the session. `item_type` is
/// `"sales_tax"` for the dedicated tax line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    #[serde(default)]
    pub reference: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub total_tax_amount: Option<i64>,
    #[serde(default)]
    pub item_type: Option<String>,
}

impl SessionItem {
    pub fn is_sales_tax(&self) -> bool {
        self.item_type.as_deref() == Some("sales_tax")
    }
}

/// The order object embedded in a full session fetched from the REST API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOrder {
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub amount_inc_vat: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub transaction: Option<TransactionPayload>,
    #[serde(default)]
    pub captures: Vec<SettlementPayload>,
    #[serde(default)]
    pub refunds: Vec<SettlementPayload>,
    #[serde(default)]
    pub items: Vec<SessionItem>,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// Full session object from `GET /session/{id}` and the create/update calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BriqSession {
    pub session_id: String,
    #[serde(default)]
    pub order: SessionOrder,
}

/// Body for `POST /session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub amount_inc_vat: i64,
    pub currency: String,
    pub locale: String,
    pub reference: String,
    pub items: Vec<SessionItem>,
}

/// Body for `PATCH /session/{id}`. Same shape as create; the gateway replaces
/// the order contents wholesale.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub amount_inc_vat: i64,
    pub currency: String,
    pub locale: String,
    pub items: Vec<SessionItem>,
}

/// Body for the capture/refund order actions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionRequest {
    pub amount_inc_vat: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Response of the capture/refund/cancel order actions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionResponse {
    #[serde(default)]
    pub capture_id: Option<String>,
    #[serde(default)]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub status: Option<BriqTransactionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_status_parse_lossy_is_total() {
        assert_eq!(OrderStatus::parse_lossy("Pending"), OrderStatus::Pending);
        assert_eq!(
            OrderStatus::parse_lossy("ApprovedNotCaptured"),
            OrderStatus::ApprovedNotCaptured
        );
        assert_eq!(OrderStatus::parse_lossy("Rejected"), OrderStatus::Rejected);
        assert_eq!(OrderStatus::parse_lossy("Cancelled"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::parse_lossy("SomethingNew"), OrderStatus::Unknown);
        assert_eq!(OrderStatus::parse_lossy(""), OrderStatus::Unknown);
    }

    #[test]
    fn unknown_wire_status_deserializes_to_unknown_variant() {
        let status: BriqTransactionStatus =
            serde_json::from_value(json!("PartiallyApproved")).expect("total deserialization");
        assert_eq!(status, BriqTransactionStatus::Unknown);
    }

    #[test]
    fn webhook_body_deserializes_minimal_capture_delivery() {
        let body: WebhookBody = serde_json::from_value(json!({
            "sessionId": "sess-1",
            "event": "capture_status",
            "status": "Approved",
            "captureId": "cap-1",
            "transaction": {"amountIncVat": 5000, "currency": "EUR"}
        }))
        .expect("deserialization should succeed");

        assert_eq!(body.event, EventKind::CaptureStatus);
        assert_eq!(body.capture_id.as_deref(), Some("cap-1"));
        let tx = body.transaction.expect("transaction present");
        assert_eq!(tx.amount_inc_vat, Some(5000));
        assert_eq!(tx.currency.as_deref(), Some("EUR"));
        assert_eq!(tx.status, None);
    }

    #[test]
    fn session_deserializes_with_defaulted_order() {
        let session: BriqSession = serde_json::from_value(json!({
            "sessionId": "sess-2"
        }))
        .expect("deserialization should succeed");
        assert_eq!(session.order.status, OrderStatus::Pending);
        assert!(session.order.captures.is_empty());
    }

    #[test]
    fn order_action_request_serializes_camel_case_without_empty_reference() {
        let request = OrderActionRequest {
            amount_inc_vat: 3000,
            currency: "EUR".to_string(),
            reference: None,
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialization should succeed"),
            json!({"amountIncVat": 3000, "currency": "EUR"})
        );

        let request = OrderActionRequest {
            reference: Some("order-77".to_string()),
            ..request
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialization should succeed"),
            json!({"amountIncVat": 3000, "currency": "EUR", "reference": "order-77"})
        );
    }

    #[test]
    fn order_action_response_deserializes_capture_and_refund_shapes() {
        let response: OrderActionResponse = serde_json::from_value(json!({
            "captureId": "cap-9",
            "status": "Approved"
        }))
        .expect("deserialization should succeed");
        assert_eq!(response.capture_id.as_deref(), Some("cap-9"));
        assert_eq!(response.refund_id, None);
        assert_eq!(response.status, Some(BriqTransactionStatus::Approved));

        let response: OrderActionResponse = serde_json::from_value(json!({
            "refundId": "ref-3"
        }))
        .expect("deserialization should succeed");
        assert_eq!(response.refund_id.as_deref(), Some("ref-3"));
        assert_eq!(response.status, None);
    }

    #[test]
    fn session_item_sales_tax_marker() {
        let item = SessionItem {
            reference: None,
            name: "Sales Tax".to_string(),
            quantity: 1,
            unit_price: 0,
            tax_rate: None,
            total_tax_amount: Some(950),
            item_type: Some("sales_tax".to_string()),
        };
        assert!(item.is_sales_tax());
    }
}
