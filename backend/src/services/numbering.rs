//! Document number generator
//!
//! One counter row per (tenant, series) is locked with `FOR UPDATE` inside
//! the transaction that creates the document, so two writers of the same
//! series serialize on that row and the number commits or rolls back with
//! the document. Contention that still slips through (a unique violation on
//! the document number, a serialization failure or a deadlock) is handled by
//! re-running the whole transaction under [`with_number_retry`].

use rand::Rng;
use serde::Serialize;
use shared::{next_value, AuditAction, DocumentSeries, TenantContext};
use sqlx::{PgConnection, PgPool};
use std::future::Future;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::NumberingConfig;
use crate::error::{AppError, AppResult};
use crate::services::audit;

/// SQLSTATE codes treated as transient contention
const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Bounds of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub max_total: Duration,
}

impl From<NumberingConfig> for RetryPolicy {
    fn from(config: NumberingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.base_backoff_ms)),
            max_total: config.max_total(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        NumberingConfig::default().into()
    }
}

impl RetryPolicy {
    /// Range the sleep after failed attempt `attempt` (1-based) is drawn from.
    ///
    /// The lower bound stays at the base delay; the upper bound grows by one
    /// base step per attempt until it reaches the maximum.
    pub fn backoff_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let upper = self
            .base_backoff
            .saturating_mul(attempt.saturating_add(1))
            .min(self.max_backoff);
        (self.base_backoff.min(upper), upper)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let (lower, upper) = self.backoff_bounds(attempt);
        let ms = rand::thread_rng().gen_range(lower.as_millis()..=upper.as_millis());
        Duration::from_millis(ms as u64)
    }
}

/// Whether an error is transient write contention worth retrying
pub fn is_contention(err: &AppError) -> bool {
    match err {
        AppError::DatabaseError(sqlx::Error::Database(db_err)) => matches!(
            db_err.code().as_deref(),
            Some(UNIQUE_VIOLATION) | Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ),
        _ => false,
    }
}

/// Run `op` until it succeeds, fails with a non-contention error, or the
/// policy's attempt or time budget runs out.
///
/// `op` must open and commit its own transaction so each attempt starts
/// clean. Exhaustion yields [`AppError::NumberGenerationFailed`].
pub async fn with_number_retry<T, F, Fut>(policy: &RetryPolicy, series: DocumentSeries, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_contention(&err) => {
                let elapsed = started.elapsed();
                if attempt >= policy.max_attempts || elapsed >= policy.max_total {
                    tracing::error!(
                        series = series.as_str(),
                        attempts = attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Giving up on document number: {}",
                        err
                    );
                    return Err(AppError::NumberGenerationFailed {
                        series: series.prefix().to_string(),
                    });
                }

                let delay = policy.backoff(attempt).min(policy.max_total - elapsed);
                tracing::warn!(
                    series = series.as_str(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Document number contention, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn stored_numbers(series: DocumentSeries) -> (&'static str, &'static str) {
    match series {
        DocumentSeries::PurchaseOrder => ("purchase_orders", "po_number"),
        DocumentSeries::Quote => ("quotes", "quote_number"),
        DocumentSeries::Invoice => ("invoices", "invoice_number"),
    }
}

/// Issue the next number of `series` for the tenant on the caller's
/// transaction. The counter row stays locked until that transaction ends.
pub async fn issue_number(conn: &mut PgConnection, company_id: Uuid, series: DocumentSeries) -> AppResult<String> {
    sqlx::query(
        r#"
        INSERT INTO document_counters (company_id, series, last_value)
        VALUES ($1, $2, 0)
        ON CONFLICT (company_id, series) DO NOTHING
        "#,
    )
    .bind(company_id)
    .bind(series.as_str())
    .execute(&mut *conn)
    .await?;

    let counter = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT last_value FROM document_counters
        WHERE company_id = $1 AND series = $2
        FOR UPDATE
        "#,
    )
    .bind(company_id)
    .bind(series.as_str())
    .fetch_one(&mut *conn)
    .await?;

    // Documents created before the counter existed still claim their numbers
    let (table, column) = stored_numbers(series);
    let highest = sqlx::query_scalar::<_, Option<i64>>(&format!(
        r#"
        SELECT MAX(CAST(SUBSTRING({column} FROM '^' || $2 || '-([0-9]+)$') AS BIGINT))
        FROM {table}
        WHERE company_id = $1
        "#
    ))
    .bind(company_id)
    .bind(series.prefix())
    .fetch_one(&mut *conn)
    .await?;

    let next = next_value(counter, highest);

    sqlx::query(
        r#"
        UPDATE document_counters SET last_value = $3
        WHERE company_id = $1 AND series = $2
        "#,
    )
    .bind(company_id)
    .bind(series.as_str())
    .bind(next)
    .execute(&mut *conn)
    .await?;

    Ok(series.format(next))
}

/// A number reserved without a document
#[derive(Debug, Clone, Serialize)]
pub struct IssuedNumber {
    pub series: DocumentSeries,
    pub number: String,
}

/// Numbering service for standalone reservations
#[derive(Clone)]
pub struct NumberingService {
    db: PgPool,
    retry: RetryPolicy,
}

impl NumberingService {
    /// Create a new NumberingService instance
    pub fn new(db: PgPool, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Reserve the next number of a series.
    ///
    /// The value is consumed even if no document ever uses it.
    pub async fn issue(&self, tenant: &TenantContext, series: DocumentSeries) -> AppResult<IssuedNumber> {
        let number = with_number_retry(&self.retry, series, || self.issue_once(tenant, series)).await?;

        tracing::info!(
            company_id = %tenant.company_id,
            series = series.as_str(),
            number = %number,
            "Document number reserved"
        );

        Ok(IssuedNumber { series, number })
    }

    async fn issue_once(&self, tenant: &TenantContext, series: DocumentSeries) -> AppResult<String> {
        let mut tx = self.db.begin().await?;

        let number = issue_number(&mut *tx, tenant.company_id, series).await?;
        audit::record(
            &mut *tx,
            tenant,
            AuditAction::DocumentNumberIssued,
            serde_json::json!({ "series": series.as_str(), "number": number }),
        )
        .await?;

        tx.commit().await?;
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.max_total, Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_bounds(1),
            (Duration::from_millis(20), Duration::from_millis(40))
        );
        assert_eq!(
            policy.backoff_bounds(3),
            (Duration::from_millis(20), Duration::from_millis(80))
        );
        assert_eq!(
            policy.backoff_bounds(10),
            (Duration::from_millis(20), Duration::from_millis(120))
        );
    }

    #[test]
    fn test_backoff_stays_in_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=8 {
            let (lower, upper) = policy.backoff_bounds(attempt);
            let delay = policy.backoff(attempt);
            assert!(delay >= lower && delay <= upper);
        }
    }

    #[test]
    fn test_non_database_errors_are_not_contention() {
        assert!(!is_contention(&AppError::AlreadyConverted));
        assert!(!is_contention(&AppError::DatabaseError(sqlx::Error::RowNotFound)));
    }

    #[tokio::test]
    async fn test_retry_passes_through_other_errors() {
        let mut calls = 0;
        let result: AppResult<()> = with_number_retry(&RetryPolicy::default(), DocumentSeries::Quote, || {
            calls += 1;
            async { Err(AppError::AlreadyConverted) }
        })
        .await;
        assert!(matches!(result, Err(AppError::AlreadyConverted)));
        assert_eq!(calls, 1);
    }
}
