//! Total mappings from the gateway's status vocabularies onto the internal
//! three-valued transaction state. Unrecognized input maps to Pending, the
//! conservative choice: an event is never silently dropped.

use crate::gateway::types::{BriqTransactionStatus, OrderStatus};
use crate::platform::types::TransactionState;

pub fn order_status_to_internal(status: OrderStatus) -> TransactionState {
    match status {
        OrderStatus::Pending => TransactionState::Pending,
        OrderStatus::ApprovedNotCaptured => TransactionState::Success,
        OrderStatus::Rejected => TransactionState::Failure,
        OrderStatus::Cancelled => TransactionState::Failure,
        OrderStatus::Unknown => TransactionState::Pending,
    }
}

pub fn transaction_status_to_internal(status: BriqTransactionStatus) -> TransactionState {
    match status {
        BriqTransactionStatus::Approved => TransactionState::Success,
        BriqTransactionStatus::Pending => TransactionState::Pending,
        BriqTransactionStatus::Rejected => TransactionState::Failure,
        BriqTransactionStatus::Cancelled => TransactionState::Failure,
        BriqTransactionStatus::Unknown => TransactionState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_mapping_table() {
        let table = [
            (OrderStatus::Pending, TransactionState::Pending),
            (OrderStatus::ApprovedNotCaptured, TransactionState::Success),
            (OrderStatus::Rejected, TransactionState::Failure),
            (OrderStatus::Cancelled, TransactionState::Failure),
            (OrderStatus::Unknown, TransactionState::Pending),
        ];
        for (input, expected) in table {
            assert_eq!(order_status_to_internal(input), expected, "for {}", input);
        }
    }

    #[test]
    fn transaction_status_mapping_table() {
        let table = [
            (BriqTransactionStatus::Approved, TransactionState::Success),
            (BriqTransactionStatus::Pending, TransactionState::Pending),
            (BriqTransactionStatus::Rejected, TransactionState::Failure),
            (BriqTransactionStatus::Cancelled, TransactionState::Failure),
            (BriqTransactionStatus::Unknown, TransactionState::Pending),
        ];
        for (input, expected) in table {
            assert_eq!(
                transaction_status_to_internal(input),
                expected,
                "for {}",
                input
            );
        }
    }
}
