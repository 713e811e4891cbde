//! Quote lifecycle

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::types::{ParseEnumError, TransitionError};

/// Quote status
///
/// `DRAFT → SENT → ACCEPTED | REJECTED`, then `ACCEPTED → INVOICED` through
/// conversion only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Invoiced,
}

/// Operator actions on a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAction {
    Send,
    Accept,
    Reject,
}

impl QuoteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteAction::Send => "send",
            QuoteAction::Accept => "accept",
            QuoteAction::Reject => "reject",
        }
    }
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Invoiced => "INVOICED",
        }
    }

    /// Header fields and lines may change until the quote is invoiced
    pub fn is_editable(&self) -> bool {
        !matches!(self, QuoteStatus::Invoiced)
    }

    /// Status after `action`, or why the move is illegal
    pub fn apply(self, action: QuoteAction) -> Result<QuoteStatus, TransitionError> {
        match (self, action) {
            (QuoteStatus::Draft, QuoteAction::Send) => Ok(QuoteStatus::Sent),
            (QuoteStatus::Sent, QuoteAction::Accept) => Ok(QuoteStatus::Accepted),
            (QuoteStatus::Sent, QuoteAction::Reject) => Ok(QuoteStatus::Rejected),
            (from, action) => Err(TransitionError::Illegal {
                document: "quote",
                from: from.as_str(),
                action: action.as_str(),
            }),
        }
    }

    /// Checks run before a quote becomes an invoice
    pub fn check_convertible(self) -> Result<(), TransitionError> {
        match self {
            QuoteStatus::Invoiced => Err(TransitionError::AlreadyConverted),
            QuoteStatus::Accepted => Ok(()),
            other => Err(TransitionError::QuoteNotAccepted(other.as_str())),
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(QuoteStatus::Draft),
            "SENT" => Ok(QuoteStatus::Sent),
            "ACCEPTED" => Ok(QuoteStatus::Accepted),
            "REJECTED" => Ok(QuoteStatus::Rejected),
            "INVOICED" => Ok(QuoteStatus::Invoiced),
            other => Err(ParseEnumError::new("quote status", other)),
        }
    }
}

impl TryFrom<String> for QuoteStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let status = QuoteStatus::Draft.apply(QuoteAction::Send).unwrap();
        let status = status.apply(QuoteAction::Accept).unwrap();
        assert_eq!(status, QuoteStatus::Accepted);
        assert!(status.check_convertible().is_ok());
    }

    #[test]
    fn test_cannot_accept_draft() {
        assert!(matches!(
            QuoteStatus::Draft.apply(QuoteAction::Accept),
            Err(TransitionError::Illegal { from: "DRAFT", .. })
        ));
    }

    #[test]
    fn test_rejected_is_terminal() {
        for action in [QuoteAction::Send, QuoteAction::Accept, QuoteAction::Reject] {
            assert!(QuoteStatus::Rejected.apply(action).is_err());
        }
    }

    #[test]
    fn test_conversion_checks() {
        assert_eq!(
            QuoteStatus::Invoiced.check_convertible(),
            Err(TransitionError::AlreadyConverted)
        );
        assert_eq!(
            QuoteStatus::Sent.check_convertible(),
            Err(TransitionError::QuoteNotAccepted("SENT"))
        );
    }

    #[test]
    fn test_only_invoiced_is_locked() {
        assert!(QuoteStatus::Rejected.is_editable());
        assert!(!QuoteStatus::Invoiced.is_editable());
    }
}
