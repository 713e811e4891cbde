//! Stock ledger tests
//!
//! Tests for quantity arithmetic and bulk movements including:
//! - Quantities never go negative
//! - Transfers conserve the total across locations
//! - Sales drain the fullest location first and report any shortfall

use proptest::prelude::*;
use shared::{apply_adjustment, apply_transfer, is_low_stock, plan_drain, LedgerError, StockAction, StockHolding};
use stockroom_backend::services::stock::{merge_lines, StockLine};
use uuid::Uuid;

fn loc(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn holding(n: u128, quantity: i32) -> StockHolding {
    StockHolding {
        location_id: loc(n),
        quantity,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Add, remove, then an over-removal that must leave the row untouched
    #[test]
    fn test_remove_then_insufficient() {
        let qty = apply_adjustment(0, StockAction::Add, 10).unwrap();
        assert_eq!(qty, 10);

        let qty = apply_adjustment(qty, StockAction::Remove, 4).unwrap();
        assert_eq!(qty, 6);

        assert_eq!(
            apply_adjustment(qty, StockAction::Remove, 10),
            Err(LedgerError::InsufficientStock {
                available: 6,
                requested: 10
            })
        );
    }

    /// Set overwrites regardless of the current quantity
    #[test]
    fn test_set_overwrites() {
        assert_eq!(apply_adjustment(25, StockAction::Set, 3), Ok(3));
        assert_eq!(apply_adjustment(0, StockAction::Set, 0), Ok(0));
    }

    #[test]
    fn test_negative_adjustment_rejected() {
        assert_eq!(
            apply_adjustment(5, StockAction::Add, -1),
            Err(LedgerError::NegativeQuantity(-1))
        );
    }

    #[test]
    fn test_add_overflow_rejected() {
        assert_eq!(
            apply_adjustment(i32::MAX, StockAction::Add, 1),
            Err(LedgerError::Overflow)
        );
    }

    /// Transfer 5 from A(5) to B(0): A=0, B=5
    #[test]
    fn test_transfer_everything() {
        assert_eq!(apply_transfer(5, 0, 5), Ok((0, 5)));
    }

    #[test]
    fn test_transfer_more_than_available() {
        assert_eq!(
            apply_transfer(3, 10, 4),
            Err(LedgerError::InsufficientStock {
                available: 3,
                requested: 4
            })
        );
    }

    #[test]
    fn test_transfer_zero_rejected() {
        assert_eq!(apply_transfer(3, 0, 0), Err(LedgerError::NonPositiveQuantity(0)));
    }

    /// 12 units from A=10, B=5: take 10 from A, then 2 from B
    #[test]
    fn test_drain_fullest_first() {
        let plan = plan_drain(12, &[holding(2, 5), holding(1, 10)]);
        assert_eq!(plan.shortfall, 0);
        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.draws[0].location_id, loc(1));
        assert_eq!(plan.draws[0].taken, 10);
        assert_eq!(plan.draws[0].new_quantity, 0);
        assert_eq!(plan.draws[1].location_id, loc(2));
        assert_eq!(plan.draws[1].taken, 2);
        assert_eq!(plan.draws[1].new_quantity, 3);
    }

    /// 20 units against 15 on hand: everything drained, 5 short
    #[test]
    fn test_drain_with_shortfall() {
        let plan = plan_drain(20, &[holding(1, 10), holding(2, 5)]);
        assert_eq!(plan.total_taken(), 15);
        assert_eq!(plan.shortfall, 5);
        assert!(plan.draws.iter().all(|d| d.new_quantity == 0));
    }

    #[test]
    fn test_drain_ties_break_on_location() {
        let plan = plan_drain(4, &[holding(9, 4), holding(3, 4)]);
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].location_id, loc(3));
    }

    #[test]
    fn test_drain_skips_empty_locations() {
        let plan = plan_drain(3, &[holding(1, 0), holding(2, 0)]);
        assert!(plan.draws.is_empty());
        assert_eq!(plan.shortfall, 3);
    }

    #[test]
    fn test_low_stock_threshold_is_inclusive() {
        assert!(is_low_stock(10, 10));
        assert!(is_low_stock(0, 10));
        assert!(!is_low_stock(11, 10));
    }

    #[test]
    fn test_merge_lines_sums_per_product() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        let merged = merge_lines(&[
            StockLine { product_id: a, quantity: 3 },
            StockLine { product_id: b, quantity: 1 },
            StockLine { product_id: a, quantity: 4 },
        ])
        .unwrap();
        assert_eq!(
            merged,
            vec![
                StockLine { product_id: b, quantity: 1 },
                StockLine { product_id: a, quantity: 7 },
            ]
        );
    }

    #[test]
    fn test_merge_lines_drops_empty_quantities() {
        let merged = merge_lines(&[StockLine {
            product_id: Uuid::from_u128(1),
            quantity: 0,
        }])
        .unwrap();
        assert!(merged.is_empty());
    }

    /// Two huge lines of one product must not wrap into a negative total
    #[test]
    fn test_merge_lines_overflow_is_an_error() {
        let product_id = Uuid::from_u128(1);
        let lines = [
            StockLine { product_id, quantity: 2_000_000_000 },
            StockLine { product_id, quantity: 2_000_000_000 },
        ];
        assert_eq!(merge_lines(&lines), Err(LedgerError::Overflow));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn action_strategy() -> impl Strategy<Value = StockAction> {
        prop_oneof![
            Just(StockAction::Add),
            Just(StockAction::Remove),
            Just(StockAction::Set),
        ]
    }

    fn holdings_strategy() -> impl Strategy<Value = Vec<StockHolding>> {
        prop::collection::vec(0i32..500, 0..8).prop_map(|qtys| {
            qtys.into_iter()
                .enumerate()
                .map(|(i, q)| holding(i as u128 + 1, q))
                .collect()
        })
    }

    proptest! {
        /// Any sequence of adjustments keeps the quantity non-negative
        #[test]
        fn prop_adjustments_never_negative(
            ops in prop::collection::vec((action_strategy(), 0i32..1000), 0..50)
        ) {
            let mut qty = 0;
            for (action, amount) in ops {
                match apply_adjustment(qty, action, amount) {
                    Ok(next) => qty = next,
                    Err(LedgerError::InsufficientStock { available, requested }) => {
                        prop_assert_eq!(available, qty);
                        prop_assert!(requested > available);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
                prop_assert!(qty >= 0);
            }
        }

        /// A successful transfer keeps source + destination constant
        #[test]
        fn prop_transfer_conserves_total(
            source in 0i32..10_000,
            destination in 0i32..10_000,
            quantity in 1i32..10_000,
        ) {
            match apply_transfer(source, destination, quantity) {
                Ok((s, d)) => {
                    prop_assert_eq!(s + d, source + destination);
                    prop_assert!(s >= 0);
                }
                Err(LedgerError::InsufficientStock { .. }) => prop_assert!(quantity > source),
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        /// taken + shortfall always equals what was asked for, and no
        /// location is drawn below zero
        #[test]
        fn prop_drain_accounts_for_every_unit(
            needed in 0i32..3000,
            holdings in holdings_strategy(),
        ) {
            let plan = plan_drain(needed, &holdings);
            let on_hand: i32 = holdings.iter().map(|h| h.quantity).sum();

            prop_assert_eq!(plan.total_taken() + plan.shortfall, needed);
            prop_assert_eq!(plan.shortfall, (needed - on_hand).max(0));
            for draw in &plan.draws {
                prop_assert!(draw.taken > 0);
                prop_assert!(draw.new_quantity >= 0);
                prop_assert_eq!(draw.old_quantity - draw.taken, draw.new_quantity);
            }
        }

        /// Only the last location drawn may be left partially full
        #[test]
        fn prop_drain_empties_all_but_last(
            needed in 1i32..3000,
            holdings in holdings_strategy(),
        ) {
            let plan = plan_drain(needed, &holdings);
            if let Some((_, earlier)) = plan.draws.split_last() {
                prop_assert!(earlier.iter().all(|d| d.new_quantity == 0));
            }
        }

        /// Merging never changes the per-product totals
        #[test]
        fn prop_merge_preserves_totals(
            lines in prop::collection::vec((0u128..5, 1i32..100), 0..20)
        ) {
            let lines: Vec<StockLine> = lines
                .into_iter()
                .map(|(p, q)| StockLine { product_id: Uuid::from_u128(p), quantity: q })
                .collect();
            let merged = merge_lines(&lines).unwrap();

            let before: i32 = lines.iter().map(|l| l.quantity).sum();
            let after: i32 = merged.iter().map(|l| l.quantity).sum();
            prop_assert_eq!(before, after);
            prop_assert!(merged.windows(2).all(|w| w[0].product_id < w[1].product_id));
        }
    }
}
