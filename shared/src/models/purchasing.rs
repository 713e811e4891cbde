//! Purchase order lifecycle and receiving

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::types::{ParseEnumError, TransitionError};

/// Purchase order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// Operator actions on a purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOrderAction {
    Send,
    Confirm,
}

impl PurchaseOrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderAction::Send => "send",
            PurchaseOrderAction::Confirm => "confirm",
        }
    }
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Sent => "SENT",
            PurchaseOrderStatus::Confirmed => "CONFIRMED",
            PurchaseOrderStatus::PartiallyReceived => "PARTIALLY_RECEIVED",
            PurchaseOrderStatus::Received => "RECEIVED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Header and lines may change before anything arrives
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Sent | PurchaseOrderStatus::Confirmed
        )
    }

    pub fn apply(self, action: PurchaseOrderAction) -> Result<PurchaseOrderStatus, TransitionError> {
        match (self, action) {
            (PurchaseOrderStatus::Draft, PurchaseOrderAction::Send) => Ok(PurchaseOrderStatus::Sent),
            (PurchaseOrderStatus::Sent, PurchaseOrderAction::Confirm) => Ok(PurchaseOrderStatus::Confirmed),
            (from, action) => Err(TransitionError::Illegal {
                document: "purchase order",
                from: from.as_str(),
                action: action.as_str(),
            }),
        }
    }

    pub fn check_receivable(self) -> Result<(), TransitionError> {
        match self {
            PurchaseOrderStatus::Received => Err(TransitionError::AlreadyReceived),
            PurchaseOrderStatus::Cancelled => Err(TransitionError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Cancelling is refused once goods have arrived or been shelved
    pub fn check_cancellable(self, stock_added: bool) -> Result<(), TransitionError> {
        match self {
            PurchaseOrderStatus::Cancelled => Err(TransitionError::Cancelled),
            PurchaseOrderStatus::Received | PurchaseOrderStatus::PartiallyReceived => {
                Err(TransitionError::Illegal {
                    document: "purchase order",
                    from: self.as_str(),
                    action: "cancel",
                })
            }
            _ if stock_added => Err(TransitionError::AlreadyAdded),
            _ => Ok(()),
        }
    }

    pub fn check_stock_addable(self, stock_added: bool) -> Result<(), TransitionError> {
        if stock_added {
            return Err(TransitionError::AlreadyAdded);
        }
        if self != PurchaseOrderStatus::Received {
            return Err(TransitionError::NotYetReceived);
        }
        Ok(())
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseOrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(PurchaseOrderStatus::Draft),
            "SENT" => Ok(PurchaseOrderStatus::Sent),
            "CONFIRMED" => Ok(PurchaseOrderStatus::Confirmed),
            "PARTIALLY_RECEIVED" => Ok(PurchaseOrderStatus::PartiallyReceived),
            "RECEIVED" => Ok(PurchaseOrderStatus::Received),
            "CANCELLED" => Ok(PurchaseOrderStatus::Cancelled),
            other => Err(ParseEnumError::new("purchase order status", other)),
        }
    }
}

impl TryFrom<String> for PurchaseOrderStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ordered and received quantities of one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub quantity_ordered: i32,
    pub quantity_received: i32,
}

/// Status after a receipt has been recorded.
///
/// Every line covered → RECEIVED; anything received → PARTIALLY_RECEIVED;
/// otherwise the current status is kept. An order with no lines keeps its
/// status.
pub fn derive_receipt_status(current: PurchaseOrderStatus, lines: &[ReceiptLine]) -> PurchaseOrderStatus {
    if lines.is_empty() {
        return current;
    }
    if lines.iter().all(|l| l.quantity_received >= l.quantity_ordered) {
        PurchaseOrderStatus::Received
    } else if lines.iter().any(|l| l.quantity_received > 0) {
        PurchaseOrderStatus::PartiallyReceived
    } else {
        current
    }
}
