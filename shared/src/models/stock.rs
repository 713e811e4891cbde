//! Stock ledger arithmetic
//!
//! The backend locks the rows; these functions decide what the new
//! quantities are.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

use super::AuditAction;
use crate::types::ParseEnumError;

/// Manual adjustment kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockAction {
    Add,
    Remove,
    /// Replace the counted quantity (stock take)
    Set,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::Add => "add",
            StockAction::Remove => "remove",
            StockAction::Set => "set",
        }
    }

    /// Audit kind recorded for an adjustment of this kind
    pub fn audit_action(&self) -> AuditAction {
        match self {
            StockAction::Add => AuditAction::StockAdded,
            StockAction::Remove => AuditAction::StockRemoved,
            StockAction::Set => AuditAction::StockSet,
        }
    }
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(StockAction::Add),
            "remove" => Ok(StockAction::Remove),
            "set" => Ok(StockAction::Set),
            other => Err(ParseEnumError::new("stock action", other)),
        }
    }
}

/// Ledger rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("source and destination locations must differ")]
    SameLocation,

    #[error("quantity cannot be negative (got {0})")]
    NegativeQuantity(i32),

    #[error("quantity must be greater than zero (got {0})")]
    NonPositiveQuantity(i32),

    #[error("quantity overflow")]
    Overflow,
}

/// Apply a manual adjustment to the current quantity.
pub fn apply_adjustment(current: i32, action: StockAction, quantity: i32) -> Result<i32, LedgerError> {
    if quantity < 0 {
        return Err(LedgerError::NegativeQuantity(quantity));
    }

    match action {
        StockAction::Add => current.checked_add(quantity).ok_or(LedgerError::Overflow),
        StockAction::Remove => {
            if quantity > current {
                Err(LedgerError::InsufficientStock {
                    available: current,
                    requested: quantity,
                })
            } else {
                Ok(current - quantity)
            }
        }
        StockAction::Set => Ok(quantity),
    }
}

/// New `(source, destination)` quantities after moving `quantity` units.
pub fn apply_transfer(source: i32, destination: i32, quantity: i32) -> Result<(i32, i32), LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::NonPositiveQuantity(quantity));
    }
    if source < quantity {
        return Err(LedgerError::InsufficientStock {
            available: source,
            requested: quantity,
        });
    }
    let destination = destination.checked_add(quantity).ok_or(LedgerError::Overflow)?;
    Ok((source - quantity, destination))
}

/// Quantity of a product held at one location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHolding {
    pub location_id: Uuid,
    pub quantity: i32,
}

/// One location's contribution to a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Draw {
    pub location_id: Uuid,
    pub taken: i32,
    pub old_quantity: i32,
    pub new_quantity: i32,
}

/// How a sale line is served from the tenant's locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainPlan {
    pub draws: Vec<Draw>,
    /// Units that could not be served; tolerated, never blocks the sale
    pub shortfall: i32,
}

impl DrainPlan {
    pub fn total_taken(&self) -> i32 {
        self.draws.iter().map(|d| d.taken).sum()
    }
}

/// Serve `needed` units, draining the fullest location first.
///
/// Ties are broken by location id so two runs over the same rows always
/// produce the same plan. Empty locations never appear in the plan.
pub fn plan_drain(needed: i32, holdings: &[StockHolding]) -> DrainPlan {
    let mut ordered: Vec<StockHolding> = holdings.iter().copied().filter(|h| h.quantity > 0).collect();
    ordered.sort_by(|a, b| b.quantity.cmp(&a.quantity).then(a.location_id.cmp(&b.location_id)));

    let mut remaining = needed.max(0);
    let mut draws = Vec::new();

    for holding in ordered {
        if remaining == 0 {
            break;
        }
        let taken = holding.quantity.min(remaining);
        remaining -= taken;
        draws.push(Draw {
            location_id: holding.location_id,
            taken,
            old_quantity: holding.quantity,
            new_quantity: holding.quantity - taken,
        });
    }

    DrainPlan {
        draws,
        shortfall: remaining,
    }
}

/// A product is low on stock at or below its reorder threshold
pub fn is_low_stock(quantity: i64, reorder_threshold: i32) -> bool {
    quantity <= reorder_threshold as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn test_remove_scenario() {
        let qty = apply_adjustment(10, StockAction::Remove, 4).unwrap();
        assert_eq!(qty, 6);
        assert_eq!(
            apply_adjustment(qty, StockAction::Remove, 10),
            Err(LedgerError::InsufficientStock {
                available: 6,
                requested: 10
            })
        );
    }

    #[test]
    fn test_set_is_unconditional() {
        assert_eq!(apply_adjustment(42, StockAction::Set, 0), Ok(0));
        assert_eq!(apply_adjustment(0, StockAction::Set, 7), Ok(7));
        assert!(apply_adjustment(0, StockAction::Set, -1).is_err());
    }

    #[test]
    fn test_transfer_scenario() {
        let (a, b) = apply_transfer(6, 0, 5).unwrap();
        assert_eq!((a, b), (1, 5));
        assert!(matches!(
            apply_transfer(a, b, 10),
            Err(LedgerError::InsufficientStock { .. })
        ));
        assert_eq!(apply_transfer(5, 0, 0), Err(LedgerError::NonPositiveQuantity(0)));
    }

    #[test]
    fn test_drain_prefers_fullest_location() {
        let holdings = [
            StockHolding { location_id: loc(1), quantity: 3 },
            StockHolding { location_id: loc(2), quantity: 8 },
            StockHolding { location_id: loc(3), quantity: 5 },
        ];
        let plan = plan_drain(10, &holdings);
        assert_eq!(plan.shortfall, 0);
        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.draws[0].location_id, loc(2));
        assert_eq!(plan.draws[0].taken, 8);
        assert_eq!(plan.draws[1].location_id, loc(3));
        assert_eq!(plan.draws[1].taken, 2);
        assert_eq!(plan.draws[1].new_quantity, 3);
    }

    #[test]
    fn test_drain_records_shortfall() {
        let holdings = [StockHolding { location_id: loc(1), quantity: 4 }];
        let plan = plan_drain(10, &holdings);
        assert_eq!(plan.total_taken(), 4);
        assert_eq!(plan.shortfall, 6);
    }

    #[test]
    fn test_drain_tie_break_is_stable() {
        let holdings = [
            StockHolding { location_id: loc(9), quantity: 5 },
            StockHolding { location_id: loc(4), quantity: 5 },
        ];
        let plan = plan_drain(3, &holdings);
        assert_eq!(plan.draws[0].location_id, loc(4));
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("remove".parse::<StockAction>(), Ok(StockAction::Remove));
        assert!("delete".parse::<StockAction>().is_err());
    }
}
