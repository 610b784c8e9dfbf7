//! Commerce-platform data model: carts, payments and their transactions.
//!
//! These mirror the platform's wire representation (camelCase JSON, versioned
//! records, update actions) so the HTTP client can use them directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Name of the cart custom field holding the bound gateway session id.
pub const SESSION_BINDING_FIELD: &str = "briqSessionId";

/// Key of the custom type that carries the binding field.
pub const SESSION_BINDING_TYPE: &str = "briq-session";

/// Monetary amount in minor units (cents) with an ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub cent_amount: i64,
    pub currency_code: String,
}

impl Money {
    pub fn new(cent_amount: i64, currency_code: impl Into<String>) -> Self {
        Self {
            cent_amount,
            currency_code: currency_code.into(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cent_amount, self.currency_code)
    }
}

/// Transaction kinds recorded on a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Authorization,
    Charge,
    Refund,
    CancelAuthorization,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Authorization => "Authorization",
            TransactionType::Charge => "Charge",
            TransactionType::Refund => "Refund",
            TransactionType::CancelAuthorization => "CancelAuthorization",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Authorization" => Ok(TransactionType::Authorization),
            "Charge" => Ok(TransactionType::Charge),
            "Refund" => Ok(TransactionType::Refund),
            "CancelAuthorization" => Ok(TransactionType::CancelAuthorization),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// The three-valued internal transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Pending,
    Success,
    Failure,
}

impl TransactionState {
    /// Terminal states are never transitioned again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Success | TransactionState::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Pending => "Pending",
            TransactionState::Success => "Success",
            TransactionState::Failure => "Failure",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TransactionState::Pending),
            "Success" => Ok(TransactionState::Success),
            "Failure" => Ok(TransactionState::Failure),
            other => Err(format!("unknown transaction state: {}", other)),
        }
    }
}

/// A single transaction recorded on a payment.
///
/// `interaction_id` is the gateway-side identifier the transaction is keyed
/// by: the session id for authorizations, the capture id for charges, the
/// refund id for refunds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub interaction_id: String,
    pub state: TransactionState,
    pub amount: Money,
}

/// Draft for a transaction to be appended to a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub interaction_id: String,
    pub state: TransactionState,
    pub amount: Money,
}

/// The platform's payment aggregate. `interface_id` joins the payment to its
/// gateway session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub version: u64,
    pub interface_id: Option<String>,
    pub amount_planned: Money,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Payment {
    /// Look up the transaction content-addressed by `(type, interaction_id)`.
    pub fn find_transaction(
        &self,
        transaction_type: TransactionType,
        interaction_id: &str,
    ) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| {
            tx.transaction_type == transaction_type && tx.interaction_id == interaction_id
        })
    }

    /// The authorization transaction for the given session, if any. A payment
    /// holds at most one.
    pub fn authorization_for(&self, session_id: &str) -> Option<&Transaction> {
        self.find_transaction(TransactionType::Authorization, session_id)
    }
}

/// Draft for creating a payment, used when a webhook arrives before the
/// payment record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub interface_id: String,
    pub amount_planned: Money,
    #[serde(default)]
    pub transactions: Vec<TransactionDraft>,
}

/// Update actions accepted by the payment endpoint. The platform applies the
/// whole list atomically under the submitted version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PaymentUpdateAction {
    #[serde(rename_all = "camelCase")]
    AddTransaction { transaction: TransactionDraft },
    #[serde(rename_all = "camelCase")]
    ChangeTransactionState {
        transaction_id: String,
        state: TransactionState,
    },
}

/// Per-locale text, as the platform stores line item names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedString(pub HashMap<String, String>);

impl LocalizedString {
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0.get(locale).map(String::as_str)
    }

    pub fn from_single(locale: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert(locale.into(), value.into());
        Self(map)
    }
}

/// A cart line item, carrying everything the gateway session comparison
/// needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub name: LocalizedString,
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub tax_rate: Option<Decimal>,
}

/// Custom fields attached to a cart under a named custom type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFields {
    #[serde(rename = "type")]
    pub type_key: String,
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
}

/// The platform cart, versioned for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub version: u64,
    pub locale: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub total_price: Money,
    pub total_tax: Option<Money>,
    pub custom: Option<CustomFields>,
}

impl Cart {
    /// The gateway session bound to this cart, read from the binding custom
    /// field.
    pub fn session_binding(&self) -> Option<&str> {
        self.custom
            .as_ref()
            .and_then(|custom| custom.fields.get(SESSION_BINDING_FIELD))
            .and_then(|value| value.as_str())
    }
}
