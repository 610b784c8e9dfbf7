//! Transaction reconciler.
//!
//! Pure planning: given the current payment (if any), a normalized gateway
//! snapshot and a routed event, decide what the platform write should be.
//! Executing the plan is the caller's job, so every idempotency rule here is
//! testable without I/O.
//!
//! Idempotency is content-addressed. A transaction is identified by
//! `(type, interaction_id)`; a redelivered event finds its transaction already
//! present and plans no write. Transactions in a terminal state are never
//! transitioned again.

use thiserror::Error;
use tracing::debug;

use crate::gateway::session::{ExternalSession, TransactionRecord};
use crate::gateway::status::{order_status_to_internal, transaction_status_to_internal};
use crate::platform::types::{
    Money, Payment, PaymentDraft, PaymentUpdateAction, Transaction, TransactionDraft,
    TransactionState, TransactionType,
};
use crate::services::event_router::ReconcileEvent;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The snapshot holds no record for the settlement id the event named.
    #[error("no settlement record {interaction_id} in snapshot of session {session_id}")]
    RecordNotFound {
        session_id: String,
        interaction_id: String,
    },
    /// Neither the record nor the order carried an amount and no payment
    /// exists to borrow one from. Amounts are never invented.
    #[error("no amount available for session {session_id}")]
    MissingAmount { session_id: String },
}

/// Why a plan is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The fact is already recorded in an equal or terminal state.
    AlreadyApplied,
    /// A settlement event arrived for a session with no payment. Settlements
    /// never create payments; the authorization flow owns creation.
    PaymentMissing,
}

/// The platform write a reconciliation calls for.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilePlan {
    CreatePayment(PaymentDraft),
    Update {
        payment_id: String,
        version: u64,
        actions: Vec<PaymentUpdateAction>,
    },
    Skip(SkipReason),
}

impl ReconcilePlan {
    pub fn is_skip(&self) -> bool {
        matches!(self, ReconcilePlan::Skip(_))
    }
}

/// Plan the reconciliation of one event against the current payment.
pub fn plan(
    payment: Option<&Payment>,
    snapshot: &ExternalSession,
    event: &ReconcileEvent,
) -> Result<ReconcilePlan, ReconcileError> {
    match event {
        ReconcileEvent::Order { session_id } => plan_order(payment, snapshot, session_id),
        ReconcileEvent::Capture {
            session_id,
            capture_id,
        } => plan_settlement(
            payment,
            snapshot,
            session_id,
            capture_id,
            TransactionType::Charge,
            snapshot.capture_record(capture_id),
        ),
        ReconcileEvent::Refund {
            session_id,
            refund_id,
        } => plan_settlement(
            payment,
            snapshot,
            session_id,
            refund_id,
            TransactionType::Refund,
            snapshot.refund_record(refund_id),
        ),
    }
}

/// Order events carry the authorization outcome. A missing payment is the
/// race where the webhook outran checkout; the payment is created here with
/// the authorization already recorded, whatever its outcome.
///
/// The authorization record's own status wins over the coarse order status;
/// the order status is the fallback when the payload carries no record.
fn plan_order(
    payment: Option<&Payment>,
    snapshot: &ExternalSession,
    session_id: &str,
) -> Result<ReconcilePlan, ReconcileError> {
    let target = snapshot
        .authorization
        .as_ref()
        .and_then(|record| record.status)
        .map(transaction_status_to_internal)
        .unwrap_or_else(|| order_status_to_internal(snapshot.order_status));
    let amount = settlement_amount(snapshot.authorization.as_ref(), snapshot, payment);

    let Some(payment) = payment else {
        let amount = amount.ok_or_else(|| ReconcileError::MissingAmount {
            session_id: session_id.to_string(),
        })?;
        debug!(session_id = %session_id, state = %target, "payment not found, planning creation");
        return Ok(ReconcilePlan::CreatePayment(PaymentDraft {
            interface_id: session_id.to_string(),
            amount_planned: amount.clone(),
            transactions: vec![TransactionDraft {
                transaction_type: TransactionType::Authorization,
                interaction_id: session_id.to_string(),
                state: target,
                amount,
            }],
        }));
    };

    let amount = amount.ok_or_else(|| ReconcileError::MissingAmount {
        session_id: session_id.to_string(),
    })?;

    match dedup(payment.authorization_for(session_id), target) {
        Dedup::Append => Ok(ReconcilePlan::Update {
            payment_id: payment.id.clone(),
            version: payment.version,
            actions: vec![PaymentUpdateAction::AddTransaction {
                transaction: TransactionDraft {
                    transaction_type: TransactionType::Authorization,
                    interaction_id: session_id.to_string(),
                    state: target,
                    amount,
                },
            }],
        }),
        Dedup::Transition(transaction_id) => Ok(ReconcilePlan::Update {
            payment_id: payment.id.clone(),
            version: payment.version,
            actions: vec![PaymentUpdateAction::ChangeTransactionState {
                transaction_id,
                state: target,
            }],
        }),
        Dedup::Skip => Ok(ReconcilePlan::Skip(SkipReason::AlreadyApplied)),
    }
}

/// Capture and refund events. If the payment is missing the event is dropped;
/// if the authorization is still Pending it is promoted to Success in the
/// same atomic action list, ordered before the settlement write.
fn plan_settlement(
    payment: Option<&Payment>,
    snapshot: &ExternalSession,
    session_id: &str,
    interaction_id: &str,
    transaction_type: TransactionType,
    record: Option<&TransactionRecord>,
) -> Result<ReconcilePlan, ReconcileError> {
    let Some(payment) = payment else {
        debug!(
            session_id = %session_id,
            interaction_id = %interaction_id,
            "payment not found for settlement event, dropping"
        );
        return Ok(ReconcilePlan::Skip(SkipReason::PaymentMissing));
    };

    let record = record.ok_or_else(|| ReconcileError::RecordNotFound {
        session_id: session_id.to_string(),
        interaction_id: interaction_id.to_string(),
    })?;

    let target = record
        .status
        .map(transaction_status_to_internal)
        .unwrap_or(TransactionState::Pending);

    let mut actions = Vec::new();
    if let Some(auth) = payment.authorization_for(session_id) {
        if auth.state == TransactionState::Pending {
            actions.push(PaymentUpdateAction::ChangeTransactionState {
                transaction_id: auth.id.clone(),
                state: TransactionState::Success,
            });
        }
    }

    match dedup(
        payment.find_transaction(transaction_type, interaction_id),
        target,
    ) {
        Dedup::Append => {
            let amount = settlement_amount(Some(record), snapshot, Some(payment)).ok_or_else(
                || ReconcileError::MissingAmount {
                    session_id: session_id.to_string(),
                },
            )?;
            actions.push(PaymentUpdateAction::AddTransaction {
                transaction: TransactionDraft {
                    transaction_type,
                    interaction_id: interaction_id.to_string(),
                    state: target,
                    amount,
                },
            });
        }
        Dedup::Transition(transaction_id) => {
            actions.push(PaymentUpdateAction::ChangeTransactionState {
                transaction_id,
                state: target,
            });
        }
        Dedup::Skip => {}
    }

    if actions.is_empty() {
        Ok(ReconcilePlan::Skip(SkipReason::AlreadyApplied))
    } else {
        Ok(ReconcilePlan::Update {
            payment_id: payment.id.clone(),
            version: payment.version,
            actions,
        })
    }
}

enum Dedup {
    Append,
    Transition(String),
    Skip,
}

/// The uniform duplicate rule: absent appends, terminal or equal skips, a
/// Pending transaction transitions.
fn dedup(existing: Option<&Transaction>, target: TransactionState) -> Dedup {
    match existing {
        None => Dedup::Append,
        Some(tx) if tx.state.is_terminal() || tx.state == target => Dedup::Skip,
        Some(tx) => Dedup::Transition(tx.id.clone()),
    }
}

/// The amount for a new transaction: the record's own amount wins, then the
/// order-level amount, then the payment's planned amount.
fn settlement_amount(
    record: Option<&TransactionRecord>,
    snapshot: &ExternalSession,
    payment: Option<&Payment>,
) -> Option<Money> {
    record
        .and_then(|r| {
            r.amount_inc_vat
                .zip(r.currency.clone())
                .map(|(cents, currency)| Money::new(cents, currency))
        })
        .or_else(|| {
            snapshot
                .order_amount
                .as_ref()
                .map(|amount| Money::new(amount.amount_inc_vat, amount.currency.clone()))
        })
        .or_else(|| payment.map(|p| p.amount_planned.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::WebhookBody;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> ExternalSession {
        let body: WebhookBody =
            serde_json::from_value(value).expect("webhook body should deserialize");
        ExternalSession::from_webhook(&body).expect("extraction should succeed")
    }

    fn payment_with(transactions: Vec<Transaction>) -> Payment {
        Payment {
            id: "pay-1".to_string(),
            version: 4,
            interface_id: Some("sess-1".to_string()),
            amount_planned: Money::new(5000, "EUR"),
            transactions,
        }
    }

    fn auth_tx(state: TransactionState) -> Transaction {
        Transaction {
            id: "tx-auth".to_string(),
            transaction_type: TransactionType::Authorization,
            interaction_id: "sess-1".to_string(),
            state,
            amount: Money::new(5000, "EUR"),
        }
    }

    fn order_event() -> ReconcileEvent {
        ReconcileEvent::Order {
            session_id: "sess-1".to_string(),
        }
    }

    fn capture_event(capture_id: &str) -> ReconcileEvent {
        ReconcileEvent::Capture {
            session_id: "sess-1".to_string(),
            capture_id: capture_id.to_string(),
        }
    }

    fn approved_order_snapshot() -> ExternalSession {
        snapshot(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "ApprovedNotCaptured",
            "transaction": {"id": "auth-1", "status": "Approved", "amountIncVat": 5000, "currency": "EUR"}
        }))
    }

    fn capture_snapshot(capture_id: &str, status: &str, amount: i64) -> ExternalSession {
        snapshot(json!({
            "sessionId": "sess-1",
            "event": "capture_status",
            "status": status,
            "captureId": capture_id,
            "transaction": {"amountIncVat": amount, "currency": "EUR"}
        }))
    }

    #[test]
    fn order_event_without_payment_plans_creation_with_authorization() {
        let plan = plan(None, &approved_order_snapshot(), &order_event())
            .expect("planning should succeed");

        let ReconcilePlan::CreatePayment(draft) = plan else {
            panic!("expected a creation plan, got {:?}", plan);
        };
        assert_eq!(draft.interface_id, "sess-1");
        assert_eq!(draft.amount_planned, Money::new(5000, "EUR"));
        assert_eq!(draft.transactions.len(), 1);
        assert_eq!(
            draft.transactions[0].transaction_type,
            TransactionType::Authorization
        );
        assert_eq!(draft.transactions[0].state, TransactionState::Success);
    }

    #[test]
    fn authorization_record_status_wins_over_order_status() {
        // The order is still reported Pending but the authorization record
        // itself is already Approved.
        let mixed = snapshot(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "Pending",
            "transaction": {"id": "auth-1", "status": "Approved", "amountIncVat": 5000, "currency": "EUR"}
        }));

        let plan = plan(None, &mixed, &order_event()).expect("planning should succeed");
        let ReconcilePlan::CreatePayment(draft) = plan else {
            panic!("expected a creation plan, got {:?}", plan);
        };
        assert_eq!(draft.transactions[0].state, TransactionState::Success);

        let payment = payment_with(vec![auth_tx(TransactionState::Pending)]);
        let plan =
            super::plan(Some(&payment), &mixed, &order_event()).expect("planning should succeed");
        assert_eq!(
            plan,
            ReconcilePlan::Update {
                payment_id: "pay-1".to_string(),
                version: 4,
                actions: vec![PaymentUpdateAction::ChangeTransactionState {
                    transaction_id: "tx-auth".to_string(),
                    state: TransactionState::Success,
                }],
            }
        );
    }

    #[test]
    fn order_status_is_the_fallback_without_a_record() {
        let status_only = snapshot(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "ApprovedNotCaptured",
            "amountIncVat": 5000,
            "currency": "EUR"
        }));

        let plan = plan(None, &status_only, &order_event()).expect("planning should succeed");
        let ReconcilePlan::CreatePayment(draft) = plan else {
            panic!("expected a creation plan, got {:?}", plan);
        };
        assert_eq!(draft.transactions[0].state, TransactionState::Success);
    }

    #[test]
    fn rejected_order_without_payment_still_creates_with_failure() {
        let rejected = snapshot(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "Rejected",
            "amountIncVat": 5000,
            "currency": "EUR"
        }));

        let plan = plan(None, &rejected, &order_event()).expect("planning should succeed");
        let ReconcilePlan::CreatePayment(draft) = plan else {
            panic!("expected a creation plan, got {:?}", plan);
        };
        assert_eq!(draft.transactions[0].state, TransactionState::Failure);
    }

    #[test]
    fn order_event_promotes_pending_authorization() {
        let payment = payment_with(vec![auth_tx(TransactionState::Pending)]);

        let plan = plan(Some(&payment), &approved_order_snapshot(), &order_event())
            .expect("planning should succeed");
        assert_eq!(
            plan,
            ReconcilePlan::Update {
                payment_id: "pay-1".to_string(),
                version: 4,
                actions: vec![PaymentUpdateAction::ChangeTransactionState {
                    transaction_id: "tx-auth".to_string(),
                    state: TransactionState::Success,
                }],
            }
        );
    }

    #[test]
    fn redelivered_order_event_is_a_no_op() {
        let payment = payment_with(vec![auth_tx(TransactionState::Success)]);

        let plan = plan(Some(&payment), &approved_order_snapshot(), &order_event())
            .expect("planning should succeed");
        assert_eq!(plan, ReconcilePlan::Skip(SkipReason::AlreadyApplied));
    }

    #[test]
    fn terminal_authorization_is_never_transitioned() {
        let rejected = snapshot(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "Rejected",
            "amountIncVat": 5000,
            "currency": "EUR"
        }));
        let payment = payment_with(vec![auth_tx(TransactionState::Success)]);

        let plan = plan(Some(&payment), &rejected, &order_event())
            .expect("planning should succeed");
        assert!(plan.is_skip());
    }

    #[test]
    fn capture_without_payment_is_dropped_not_created() {
        let plan = plan(
            None,
            &capture_snapshot("cap-1", "Approved", 5000),
            &capture_event("cap-1"),
        )
        .expect("planning should succeed");
        assert_eq!(plan, ReconcilePlan::Skip(SkipReason::PaymentMissing));
    }

    #[test]
    fn capture_appends_charge_and_promotes_pending_authorization_first() {
        let payment = payment_with(vec![auth_tx(TransactionState::Pending)]);

        let plan = plan(
            Some(&payment),
            &capture_snapshot("cap-1", "Approved", 5000),
            &capture_event("cap-1"),
        )
        .expect("planning should succeed");

        let ReconcilePlan::Update { actions, .. } = plan else {
            panic!("expected an update plan, got {:?}", plan);
        };
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            PaymentUpdateAction::ChangeTransactionState {
                transaction_id: "tx-auth".to_string(),
                state: TransactionState::Success,
            }
        );
        let PaymentUpdateAction::AddTransaction { transaction } = &actions[1] else {
            panic!("expected an append, got {:?}", actions[1]);
        };
        assert_eq!(transaction.transaction_type, TransactionType::Charge);
        assert_eq!(transaction.interaction_id, "cap-1");
        assert_eq!(transaction.state, TransactionState::Success);
        assert_eq!(transaction.amount, Money::new(5000, "EUR"));
    }

    #[test]
    fn capture_record_amount_beats_order_level_amount() {
        let payment = payment_with(vec![auth_tx(TransactionState::Success)]);
        let partial = snapshot(json!({
            "sessionId": "sess-1",
            "event": "capture_status",
            "status": "Approved",
            "captureId": "cap-1",
            "amountIncVat": 5000,
            "currency": "EUR",
            "transaction": {"amountIncVat": 2000, "currency": "EUR"}
        }));

        let plan = plan(Some(&payment), &partial, &capture_event("cap-1"))
            .expect("planning should succeed");
        let ReconcilePlan::Update { actions, .. } = plan else {
            panic!("expected an update plan, got {:?}", plan);
        };
        let PaymentUpdateAction::AddTransaction { transaction } = &actions[0] else {
            panic!("expected an append, got {:?}", actions[0]);
        };
        assert_eq!(transaction.amount, Money::new(2000, "EUR"));
    }

    #[test]
    fn redelivered_capture_still_promotes_authorization() {
        let payment = payment_with(vec![
            auth_tx(TransactionState::Pending),
            Transaction {
                id: "tx-cap".to_string(),
                transaction_type: TransactionType::Charge,
                interaction_id: "cap-1".to_string(),
                state: TransactionState::Success,
                amount: Money::new(5000, "EUR"),
            },
        ]);

        let plan = plan(
            Some(&payment),
            &capture_snapshot("cap-1", "Approved", 5000),
            &capture_event("cap-1"),
        )
        .expect("planning should succeed");

        let ReconcilePlan::Update { actions, .. } = plan else {
            panic!("expected an update plan, got {:?}", plan);
        };
        assert_eq!(
            actions,
            vec![PaymentUpdateAction::ChangeTransactionState {
                transaction_id: "tx-auth".to_string(),
                state: TransactionState::Success,
            }]
        );
    }

    #[test]
    fn fully_applied_capture_redelivery_is_a_no_op() {
        let payment = payment_with(vec![
            auth_tx(TransactionState::Success),
            Transaction {
                id: "tx-cap".to_string(),
                transaction_type: TransactionType::Charge,
                interaction_id: "cap-1".to_string(),
                state: TransactionState::Success,
                amount: Money::new(5000, "EUR"),
            },
        ]);

        let plan = plan(
            Some(&payment),
            &capture_snapshot("cap-1", "Approved", 5000),
            &capture_event("cap-1"),
        )
        .expect("planning should succeed");
        assert_eq!(plan, ReconcilePlan::Skip(SkipReason::AlreadyApplied));
    }

    #[test]
    fn pending_capture_transitions_on_approval() {
        let payment = payment_with(vec![
            auth_tx(TransactionState::Success),
            Transaction {
                id: "tx-cap".to_string(),
                transaction_type: TransactionType::Charge,
                interaction_id: "cap-1".to_string(),
                state: TransactionState::Pending,
                amount: Money::new(5000, "EUR"),
            },
        ]);

        let plan = plan(
            Some(&payment),
            &capture_snapshot("cap-1", "Approved", 5000),
            &capture_event("cap-1"),
        )
        .expect("planning should succeed");
        assert_eq!(
            plan,
            ReconcilePlan::Update {
                payment_id: "pay-1".to_string(),
                version: 4,
                actions: vec![PaymentUpdateAction::ChangeTransactionState {
                    transaction_id: "tx-cap".to_string(),
                    state: TransactionState::Success,
                }],
            }
        );
    }

    #[test]
    fn two_captures_key_independently() {
        let payment = payment_with(vec![
            auth_tx(TransactionState::Success),
            Transaction {
                id: "tx-cap".to_string(),
                transaction_type: TransactionType::Charge,
                interaction_id: "cap-1".to_string(),
                state: TransactionState::Success,
                amount: Money::new(3000, "EUR"),
            },
        ]);

        let plan = plan(
            Some(&payment),
            &capture_snapshot("cap-2", "Approved", 2000),
            &capture_event("cap-2"),
        )
        .expect("planning should succeed");
        let ReconcilePlan::Update { actions, .. } = plan else {
            panic!("expected an update plan, got {:?}", plan);
        };
        let PaymentUpdateAction::AddTransaction { transaction } = &actions[0] else {
            panic!("expected an append, got {:?}", actions[0]);
        };
        assert_eq!(transaction.interaction_id, "cap-2");
        assert_eq!(transaction.amount, Money::new(2000, "EUR"));
    }

    #[test]
    fn refund_keys_on_refund_id_with_refund_type() {
        let payment = payment_with(vec![auth_tx(TransactionState::Success)]);
        let refund = snapshot(json!({
            "sessionId": "sess-1",
            "event": "refund_status",
            "status": "Approved",
            "refundId": "ref-1",
            "refund": {"amountIncVat": 1500, "currency": "EUR"}
        }));

        let plan = plan(
            Some(&payment),
            &refund,
            &ReconcileEvent::Refund {
                session_id: "sess-1".to_string(),
                refund_id: "ref-1".to_string(),
            },
        )
        .expect("planning should succeed");

        let ReconcilePlan::Update { actions, .. } = plan else {
            panic!("expected an update plan, got {:?}", plan);
        };
        let PaymentUpdateAction::AddTransaction { transaction } = &actions[0] else {
            panic!("expected an append, got {:?}", actions[0]);
        };
        assert_eq!(transaction.transaction_type, TransactionType::Refund);
        assert_eq!(transaction.interaction_id, "ref-1");
        assert_eq!(transaction.amount, Money::new(1500, "EUR"));
    }

    #[test]
    fn settlement_with_no_amount_anywhere_borrows_amount_planned() {
        let payment = payment_with(vec![auth_tx(TransactionState::Success)]);
        let bare = snapshot(json!({
            "sessionId": "sess-1",
            "event": "capture_status",
            "status": "Approved",
            "captureId": "cap-1",
            "capture": {"id": "cap-1"}
        }));

        let plan = plan(Some(&payment), &bare, &capture_event("cap-1"))
            .expect("planning should succeed");
        let ReconcilePlan::Update { actions, .. } = plan else {
            panic!("expected an update plan, got {:?}", plan);
        };
        let PaymentUpdateAction::AddTransaction { transaction } = &actions[0] else {
            panic!("expected an append, got {:?}", actions[0]);
        };
        assert_eq!(transaction.amount, Money::new(5000, "EUR"));
    }

    #[test]
    fn order_event_with_no_amount_and_no_payment_is_an_error() {
        let bare = snapshot(json!({
            "sessionId": "sess-1",
            "event": "order_status",
            "status": "ApprovedNotCaptured"
        }));

        let result = plan(None, &bare, &order_event());
        assert!(matches!(result, Err(ReconcileError::MissingAmount { .. })));
    }
}
