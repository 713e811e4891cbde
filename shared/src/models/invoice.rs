//! Invoice lifecycle and payment rules
//!
//! Status is never set directly: it is derived from what has been paid, the
//! total and the due date. [`transition`] computes the next state and the
//! side effects it calls for; the backend applies those effects inside the
//! same database transaction that recorded the payment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::types::{ParseEnumError, TransitionError};

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Unpaid,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::PartiallyPaid => "PARTIALLY_PAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
        }
    }

    /// Issued and not yet settled
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Unpaid | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        )
    }

    /// Move a draft into circulation. A freshly issued invoice is always
    /// UNPAID; OVERDUE only comes from re-deriving it later.
    pub fn issue(self) -> Result<InvoiceStatus, TransitionError> {
        match self {
            InvoiceStatus::Draft => Ok(InvoiceStatus::Unpaid),
            other => Err(TransitionError::Illegal {
                document: "invoice",
                from: other.as_str(),
                action: "issue",
            }),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "UNPAID" => Ok(InvoiceStatus::Unpaid),
            "PARTIALLY_PAID" => Ok(InvoiceStatus::PartiallyPaid),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            other => Err(ParseEnumError::new("invoice status", other)),
        }
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Payment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    CreditCard,
    Cash,
    Check,
    Paypal,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Check => "CHECK",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::BankTransfer
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
            "CASH" => Ok(PaymentMethod::Cash),
            "CHECK" => Ok(PaymentMethod::Check),
            "PAYPAL" => Ok(PaymentMethod::Paypal),
            "OTHER" => Ok(PaymentMethod::Other),
            other => Err(ParseEnumError::new("payment method", other)),
        }
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn unpaid_by_due_date(due_date: NaiveDate, today: NaiveDate) -> InvoiceStatus {
    if due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Unpaid
    }
}

/// Status implied by the amounts and dates.
///
/// Pure and idempotent: deriving again from the same inputs returns the same
/// status. A draft with nothing paid stays a draft.
pub fn derive_invoice_status(
    current: InvoiceStatus,
    amount_paid: Decimal,
    total_amount: Decimal,
    due_date: NaiveDate,
    today: NaiveDate,
) -> InvoiceStatus {
    if amount_paid.is_zero() {
        if current == InvoiceStatus::Draft {
            InvoiceStatus::Draft
        } else {
            unpaid_by_due_date(due_date, today)
        }
    } else if amount_paid >= total_amount {
        InvoiceStatus::Paid
    } else if due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::PartiallyPaid
    }
}

/// Outstanding balance
pub fn amount_due(total_amount: Decimal, amount_paid: Decimal) -> Decimal {
    total_amount - amount_paid
}

/// Lines may be edited until money has been taken or stock has left
pub fn lines_editable(amount_paid: Decimal, stock_reduced: bool) -> bool {
    amount_paid.is_zero() && !stock_reduced
}

/// Payment rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment amount must be greater than zero")]
    NonPositiveAmount,

    #[error("payment of {amount} exceeds the outstanding balance of {outstanding}")]
    ExceedsOutstanding { amount: Decimal, outstanding: Decimal },
}

/// Validate a payment against the current balance
pub fn check_payment(amount: Decimal, outstanding: Decimal) -> Result<(), PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::NonPositiveAmount);
    }
    if amount > outstanding {
        return Err(PaymentError::ExceedsOutstanding { amount, outstanding });
    }
    Ok(())
}

/// Snapshot of the fields the status machine reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceState {
    pub status: InvoiceStatus,
    pub amount_paid: Decimal,
    pub total_amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub stock_reduced: bool,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InvoiceEvent {
    StatusChanged { from: InvoiceStatus, to: InvoiceStatus },
    BecamePaid { paid_date: NaiveDate },
    /// Stock for the invoice lines should leave the shelves now
    StockReductionDue,
}

/// Result of re-deriving an invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTransition {
    pub status: InvoiceStatus,
    pub paid_date: Option<NaiveDate>,
    pub events: Vec<InvoiceEvent>,
}

impl InvoiceTransition {
    pub fn changed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, InvoiceEvent::StatusChanged { .. }))
    }

    pub fn reduction_due(&self) -> bool {
        self.events.contains(&InvoiceEvent::StockReductionDue)
    }
}

/// Compute the next state of an invoice and the events it produces.
///
/// `paid_date` is stamped on first entry into PAID only. The reduction
/// event is emitted on the not-PAID → PAID edge while `stock_reduced` is
/// still false; the backend still guards the flag with a conditional write.
pub fn transition(state: &InvoiceState, today: NaiveDate) -> InvoiceTransition {
    let next = derive_invoice_status(
        state.status,
        state.amount_paid,
        state.total_amount,
        state.due_date,
        today,
    );

    let mut events = Vec::new();
    let mut paid_date = state.paid_date;

    if next != state.status {
        events.push(InvoiceEvent::StatusChanged {
            from: state.status,
            to: next,
        });
    }

    if next == InvoiceStatus::Paid && state.status != InvoiceStatus::Paid {
        let stamped = *paid_date.get_or_insert(today);
        events.push(InvoiceEvent::BecamePaid { paid_date: stamped });
        if !state.stock_reduced {
            events.push(InvoiceEvent::StockReductionDue);
        }
    }

    InvoiceTransition {
        status: next,
        paid_date,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn state(status: InvoiceStatus, paid: &str, total: &str, due: NaiveDate) -> InvoiceState {
        InvoiceState {
            status,
            amount_paid: dec(paid),
            total_amount: dec(total),
            due_date: due,
            paid_date: None,
            stock_reduced: false,
        }
    }

    #[test]
    fn test_unpaid_becomes_overdue() {
        let today = day(2024, 6, 15);
        let due = day(2024, 6, 14);
        assert_eq!(
            derive_invoice_status(InvoiceStatus::Unpaid, Decimal::ZERO, dec("300.00"), due, today),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn test_draft_stays_draft_until_paid() {
        let today = day(2024, 6, 15);
        assert_eq!(
            derive_invoice_status(InvoiceStatus::Draft, Decimal::ZERO, dec("10"), day(2024, 1, 1), today),
            InvoiceStatus::Draft
        );
    }

    #[test]
    fn test_partial_payment() {
        let today = day(2024, 6, 15);
        let due = day(2024, 7, 15);
        assert_eq!(
            derive_invoice_status(InvoiceStatus::Unpaid, dec("100"), dec("300"), due, today),
            InvoiceStatus::PartiallyPaid
        );
    }

    #[test]
    fn test_full_payment_emits_reduction() {
        let today = day(2024, 6, 15);
        let mut s = state(InvoiceStatus::Unpaid, "300.00", "300.00", day(2024, 7, 1));
        let t = transition(&s, today);
        assert_eq!(t.status, InvoiceStatus::Paid);
        assert_eq!(t.paid_date, Some(today));
        assert!(t.changed());
        assert!(t.reduction_due());

        s.stock_reduced = true;
        assert!(!transition(&s, today).reduction_due());
    }

    #[test]
    fn test_paid_is_stable() {
        let today = day(2024, 6, 15);
        let mut s = state(InvoiceStatus::Paid, "300.00", "300.00", day(2024, 7, 1));
        s.paid_date = Some(day(2024, 6, 1));
        let t = transition(&s, today);
        assert!(t.events.is_empty());
        assert_eq!(t.paid_date, Some(day(2024, 6, 1)));
    }

    #[test]
    fn test_issue_only_from_draft() {
        let today = day(2024, 6, 15);
        assert_eq!(InvoiceStatus::Draft.issue(), Ok(InvoiceStatus::Unpaid));
        assert!(InvoiceStatus::Unpaid.issue().is_err());

        // past due at issue: UNPAID first, OVERDUE on the next derivation
        let s = state(InvoiceStatus::Unpaid, "0", "300.00", day(2024, 6, 14));
        assert_eq!(transition(&s, today).status, InvoiceStatus::Overdue);
    }

    #[test]
    fn test_payment_checks() {
        assert_eq!(check_payment(dec("300.00"), dec("300.00")), Ok(()));
        assert_eq!(
            check_payment(dec("0.01"), Decimal::ZERO),
            Err(PaymentError::ExceedsOutstanding {
                amount: dec("0.01"),
                outstanding: Decimal::ZERO
            })
        );
        assert_eq!(check_payment(Decimal::ZERO, dec("5")), Err(PaymentError::NonPositiveAmount));
    }

    #[test]
    fn test_lines_editable() {
        assert!(lines_editable(Decimal::ZERO, false));
        assert!(!lines_editable(dec("1"), false));
        assert!(!lines_editable(Decimal::ZERO, true));
    }
}
