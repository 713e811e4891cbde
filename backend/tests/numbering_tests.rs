//! Document numbering tests
//!
//! Tests for number formatting and the retry policy including:
//! - Numbers are PREFIX-NNNNN and parse back to their value
//! - The next value never reissues a stored number
//! - Backoff stays within its configured bounds

use proptest::prelude::*;
use shared::{format_document_number, next_value, parse_document_number, DocumentSeries};
use std::time::Duration;
use stockroom_backend::config::NumberingConfig;
use stockroom_backend::services::numbering::{with_number_retry, RetryPolicy};
use stockroom_backend::AppError;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_series_prefixes() {
        assert_eq!(DocumentSeries::PurchaseOrder.prefix(), "PO");
        assert_eq!(DocumentSeries::Quote.prefix(), "QT");
        assert_eq!(DocumentSeries::Invoice.prefix(), "INV");
    }

    #[test]
    fn test_first_number_of_a_series() {
        assert_eq!(format_document_number(DocumentSeries::Quote, next_value(0, None)), "QT-00001");
    }

    /// Five digits is a minimum width, not a cap
    #[test]
    fn test_numbers_grow_past_five_digits() {
        assert_eq!(format_document_number(DocumentSeries::Invoice, 123456), "INV-123456");
        assert_eq!(parse_document_number(DocumentSeries::Invoice, "INV-123456"), Some(123456));
    }

    #[test]
    fn test_foreign_numbers_do_not_parse() {
        assert_eq!(parse_document_number(DocumentSeries::Quote, "INV-00001"), None);
        assert_eq!(parse_document_number(DocumentSeries::Quote, "QT-"), None);
        assert_eq!(parse_document_number(DocumentSeries::Quote, "QT-12a"), None);
        assert_eq!(parse_document_number(DocumentSeries::Quote, "QT00012"), None);
    }

    /// A counter behind imported documents jumps past them
    #[test]
    fn test_next_value_skips_stored_numbers() {
        assert_eq!(next_value(3, Some(40)), 41);
        assert_eq!(next_value(40, Some(3)), 41);
        assert_eq!(next_value(0, None), 1);
    }

    #[test]
    fn test_series_from_path_segment() {
        assert_eq!("quote".parse::<DocumentSeries>().unwrap(), DocumentSeries::Quote);
        assert_eq!("invoices".parse::<DocumentSeries>().unwrap(), DocumentSeries::Invoice);
        assert_eq!(
            "purchase-order".parse::<DocumentSeries>().unwrap(),
            DocumentSeries::PurchaseOrder
        );
        assert!("receipt".parse::<DocumentSeries>().is_err());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(NumberingConfig {
            max_attempts: 0,
            base_backoff_ms: 50,
            max_backoff_ms: 10,
            max_total_ms: 1000,
        });
        // At least one attempt, and the cap never sits below the base
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_backoff, Duration::from_millis(50));
        assert_eq!(policy.max_total, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let mut calls = 0;
        let number = with_number_retry(&RetryPolicy::default(), DocumentSeries::Invoice, || {
            calls += 1;
            async { Ok::<_, AppError>("INV-00001".to_string()) }
        })
        .await
        .unwrap();
        assert_eq!(number, "INV-00001");
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_business_errors() {
        let mut calls = 0;
        let result: Result<String, AppError> =
            with_number_retry(&RetryPolicy::default(), DocumentSeries::Quote, || {
                calls += 1;
                async { Err(AppError::InvalidReference("Client".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidReference(_))));
        assert_eq!(calls, 1);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn series_strategy() -> impl Strategy<Value = DocumentSeries> {
        prop_oneof![
            Just(DocumentSeries::PurchaseOrder),
            Just(DocumentSeries::Quote),
            Just(DocumentSeries::Invoice),
        ]
    }

    proptest! {
        /// Every issued number parses back to its value under its own series
        #[test]
        fn prop_format_parses_back(series in series_strategy(), value in 1i64..10_000_000) {
            let number = format_document_number(series, value);
            prop_assert!(number.starts_with(series.prefix()));
            prop_assert!(number.len() >= series.prefix().len() + 1 + 5);
            prop_assert_eq!(parse_document_number(series, &number), Some(value));
        }

        /// The next value is strictly above both the counter and every stored number
        #[test]
        fn prop_next_value_is_fresh(counter in 0i64..1_000_000, highest in proptest::option::of(0i64..1_000_000)) {
            let next = next_value(counter, highest);
            prop_assert!(next > counter);
            if let Some(h) = highest {
                prop_assert!(next > h);
            }
        }

        /// Issuing repeatedly from one counter yields a strictly increasing,
        /// gap-free run of numbers
        #[test]
        fn prop_sequential_issue_is_gap_free(start in 0i64..1000, count in 1usize..100) {
            let mut counter = start;
            let mut issued = Vec::with_capacity(count);
            for _ in 0..count {
                counter = next_value(counter, Some(counter));
                issued.push(counter);
            }
            prop_assert!(issued.windows(2).all(|w| w[1] == w[0] + 1));
            prop_assert_eq!(issued[0], start + 1);
        }

        /// Backoff upper bound grows then caps; lower bound stays at the base
        #[test]
        fn prop_backoff_bounds(attempt in 1u32..64) {
            let policy = RetryPolicy::default();
            let (lower, upper) = policy.backoff_bounds(attempt);
            prop_assert_eq!(lower, policy.base_backoff);
            prop_assert!(upper <= policy.max_backoff);
            prop_assert!(lower <= upper);
        }
    }
}
