//! Human-readable document numbers (`PO-00042`, `QT-00007`, `INV-12345`)

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::types::ParseEnumError;

/// Minimum width of the numeric part; wider values are printed in full
pub const MIN_NUMBER_WIDTH: usize = 5;

/// Independent numbering streams, each counted per tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSeries {
    PurchaseOrder,
    Quote,
    Invoice,
}

impl DocumentSeries {
    pub const ALL: [DocumentSeries; 3] = [
        DocumentSeries::PurchaseOrder,
        DocumentSeries::Quote,
        DocumentSeries::Invoice,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentSeries::PurchaseOrder => "PO",
            DocumentSeries::Quote => "QT",
            DocumentSeries::Invoice => "INV",
        }
    }

    /// Key stored in the counter table
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSeries::PurchaseOrder => "purchase_order",
            DocumentSeries::Quote => "quote",
            DocumentSeries::Invoice => "invoice",
        }
    }

    pub fn format(&self, value: i64) -> String {
        format_document_number(*self, value)
    }
}

impl fmt::Display for DocumentSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentSeries {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_order" | "purchase-order" | "purchase-orders" | "po" => Ok(DocumentSeries::PurchaseOrder),
            "quote" | "quotes" | "qt" => Ok(DocumentSeries::Quote),
            "invoice" | "invoices" | "inv" => Ok(DocumentSeries::Invoice),
            other => Err(ParseEnumError::new("document series", other)),
        }
    }
}

/// Render `value` as `PREFIX-NNNNN`
pub fn format_document_number(series: DocumentSeries, value: i64) -> String {
    format!("{}-{:0width$}", series.prefix(), value, width = MIN_NUMBER_WIDTH)
}

/// Numeric part of a number issued for `series`, if it has that shape
pub fn parse_document_number(series: DocumentSeries, number: &str) -> Option<i64> {
    let digits = number.strip_prefix(series.prefix())?.strip_prefix('-')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next value to issue, given the locked counter and the highest number
/// already stored for the series (documents imported or created before the
/// counter existed must not be reissued).
pub fn next_value(counter: i64, highest_stored: Option<i64>) -> i64 {
    counter.max(highest_stored.unwrap_or(0)).max(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_five_digits() {
        assert_eq!(format_document_number(DocumentSeries::Quote, 7), "QT-00007");
        assert_eq!(format_document_number(DocumentSeries::PurchaseOrder, 42), "PO-00042");
        assert_eq!(format_document_number(DocumentSeries::Invoice, 99999), "INV-99999");
    }

    #[test]
    fn test_format_grows_past_five_digits() {
        assert_eq!(format_document_number(DocumentSeries::Invoice, 100000), "INV-100000");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_document_number(DocumentSeries::Quote, "QT-00012"), Some(12));
        assert_eq!(parse_document_number(DocumentSeries::Quote, "INV-00012"), None);
        assert_eq!(parse_document_number(DocumentSeries::Quote, "QT-"), None);
        assert_eq!(parse_document_number(DocumentSeries::Quote, "QT-12a"), None);
    }

    #[test]
    fn test_next_value() {
        assert_eq!(next_value(0, None), 1);
        assert_eq!(next_value(4, Some(2)), 5);
        assert_eq!(next_value(4, Some(10)), 11);
    }
}
