//! Purchase order and receiving tests
//!
//! Tests for the purchase order lifecycle including:
//! - DRAFT → SENT → CONFIRMED, then receipt-driven statuses
//! - Receiving is refused once RECEIVED or CANCELLED
//! - Stock is added once, and only for fully received orders

use proptest::prelude::*;
use shared::{derive_receipt_status, PurchaseOrderAction, PurchaseOrderStatus, ReceiptLine, TransitionError};
use stockroom_backend::services::purchasing::{validate_receipt, ReceiptInput};
use stockroom_backend::AppError;
use uuid::Uuid;

fn line(ordered: i32, received: i32) -> ReceiptLine {
    ReceiptLine {
        quantity_ordered: ordered,
        quantity_received: received,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_send_then_confirm() {
        let status = PurchaseOrderStatus::Draft.apply(PurchaseOrderAction::Send).unwrap();
        assert_eq!(status, PurchaseOrderStatus::Sent);
        assert_eq!(
            status.apply(PurchaseOrderAction::Confirm).unwrap(),
            PurchaseOrderStatus::Confirmed
        );
    }

    #[test]
    fn test_confirm_requires_sent() {
        assert!(PurchaseOrderStatus::Draft.apply(PurchaseOrderAction::Confirm).is_err());
        assert!(PurchaseOrderStatus::Received.apply(PurchaseOrderAction::Send).is_err());
    }

    /// Ordered 10, receive 4 then 6
    #[test]
    fn test_two_step_receipt() {
        let status = derive_receipt_status(PurchaseOrderStatus::Confirmed, &[line(10, 4)]);
        assert_eq!(status, PurchaseOrderStatus::PartiallyReceived);
        assert!(status.check_receivable().is_ok());

        let status = derive_receipt_status(status, &[line(10, 10)]);
        assert_eq!(status, PurchaseOrderStatus::Received);
        assert_eq!(status.check_receivable(), Err(TransitionError::AlreadyReceived));
    }

    #[test]
    fn test_over_receipt_counts_as_received() {
        assert_eq!(
            derive_receipt_status(PurchaseOrderStatus::Sent, &[line(5, 7)]),
            PurchaseOrderStatus::Received
        );
    }

    #[test]
    fn test_cancel_guards() {
        assert!(PurchaseOrderStatus::Draft.check_cancellable(false).is_ok());
        assert!(PurchaseOrderStatus::Confirmed.check_cancellable(false).is_ok());
        assert_eq!(
            PurchaseOrderStatus::Cancelled.check_cancellable(false),
            Err(TransitionError::Cancelled)
        );
        assert!(PurchaseOrderStatus::Received.check_cancellable(false).is_err());
    }

    #[test]
    fn test_stock_added_once_after_full_receipt() {
        assert!(PurchaseOrderStatus::Received.check_stock_addable(false).is_ok());
        assert_eq!(
            PurchaseOrderStatus::Received.check_stock_addable(true),
            Err(TransitionError::AlreadyAdded)
        );
        assert_eq!(
            PurchaseOrderStatus::PartiallyReceived.check_stock_addable(false),
            Err(TransitionError::NotYetReceived)
        );
    }

    #[test]
    fn test_editable_until_goods_arrive() {
        assert!(PurchaseOrderStatus::Confirmed.is_editable());
        assert!(!PurchaseOrderStatus::PartiallyReceived.is_editable());
        assert!(!PurchaseOrderStatus::Cancelled.is_editable());
    }

    #[test]
    fn test_receipt_validation() {
        assert!(matches!(validate_receipt(&[]), Err(AppError::Validation { .. })));

        let items = vec![
            ReceiptInput {
                line_item_id: Uuid::new_v4(),
                quantity_received: 3,
            },
            ReceiptInput {
                line_item_id: Uuid::new_v4(),
                quantity_received: -1,
            },
        ];
        match validate_receipt(&items) {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "items[1]"),
            other => panic!("expected a validation error, got {:?}", other),
        }

        assert!(validate_receipt(&items[..1]).is_ok());
    }

    #[test]
    fn test_receiving_errors_map_to_app_errors() {
        let err: AppError = TransitionError::Cancelled.into();
        assert!(matches!(err, AppError::PurchaseOrderCancelled));
        let err: AppError = TransitionError::NotYetReceived.into();
        assert!(matches!(err, AppError::NotYetReceived));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn open_status() -> impl Strategy<Value = PurchaseOrderStatus> {
        prop_oneof![
            Just(PurchaseOrderStatus::Draft),
            Just(PurchaseOrderStatus::Sent),
            Just(PurchaseOrderStatus::Confirmed),
            Just(PurchaseOrderStatus::PartiallyReceived),
        ]
    }

    fn lines_strategy() -> impl Strategy<Value = Vec<ReceiptLine>> {
        prop::collection::vec((1i32..100, 0i32..150), 1..10)
            .prop_map(|v| v.into_iter().map(|(o, r)| line(o, r)).collect())
    }

    proptest! {
        /// RECEIVED exactly when every line is covered
        #[test]
        fn prop_received_iff_all_lines_covered(current in open_status(), lines in lines_strategy()) {
            let status = derive_receipt_status(current, &lines);
            let covered = lines.iter().all(|l| l.quantity_received >= l.quantity_ordered);
            prop_assert_eq!(status == PurchaseOrderStatus::Received, covered);
        }

        /// A receipt never moves an order backwards into DRAFT, SENT or CONFIRMED
        /// once anything has arrived
        #[test]
        fn prop_anything_received_leaves_pre_receipt_states(
            current in open_status(),
            lines in lines_strategy(),
        ) {
            let status = derive_receipt_status(current, &lines);
            if lines.iter().any(|l| l.quantity_received > 0) {
                prop_assert!(matches!(
                    status,
                    PurchaseOrderStatus::PartiallyReceived | PurchaseOrderStatus::Received
                ));
            } else {
                prop_assert_eq!(status, current);
            }
        }

        /// Receiving more never downgrades a status
        #[test]
        fn prop_receipts_are_monotonic(
            lines in lines_strategy(),
            extra in prop::collection::vec(0i32..50, 10),
        ) {
            let before = derive_receipt_status(PurchaseOrderStatus::Confirmed, &lines);
            let more: Vec<ReceiptLine> = lines
                .iter()
                .zip(extra.iter())
                .map(|(l, e)| line(l.quantity_ordered, l.quantity_received + e))
                .collect();
            let after = derive_receipt_status(before, &more);

            if before == PurchaseOrderStatus::Received {
                prop_assert_eq!(after, PurchaseOrderStatus::Received);
            }
            if before == PurchaseOrderStatus::PartiallyReceived {
                prop_assert_ne!(after, PurchaseOrderStatus::Confirmed);
            }
        }
    }
}
