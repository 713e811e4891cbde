//! Quote service
//!
//! Quotes move DRAFT → SENT → ACCEPTED/REJECTED and become read-only once
//! converted (INVOICED). Conversion itself lives in the payment coordinator
//! because it may take stock off the shelves.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{validate_tax_rate, AuditAction, DocumentSeries, QuoteAction, QuoteStatus, TenantContext, TransitionError};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::line_items::{
    self, company_defaults, ensure_client, fetch_lines, price_lines, replace_lines, totals_of, LineItem,
    LineItemInput, PriceSource, PricedLine, SalesLines,
};
use crate::services::numbering::{issue_number, with_number_retry, RetryPolicy};

/// Quote service
#[derive(Clone)]
pub struct QuoteService {
    db: PgPool,
    retry: RetryPolicy,
}

/// Quote header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Quote {
    pub id: Uuid,
    pub company_id: Uuid,
    pub quote_number: String,
    pub client_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: QuoteStatus,
    pub issue_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quote with its lines
#[derive(Debug, Clone, Serialize)]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: Quote,
    pub line_items: Vec<LineItem>,
}

/// Input for creating a quote
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuoteInput {
    pub client_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    /// Defaults to the company's sales tax rate
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

/// Input for updating a quote; `line_items` replaces every line when given
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateQuoteInput {
    pub client_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

/// Filters for listing quotes
#[derive(Debug, Default, Deserialize)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<Uuid>,
}

pub(crate) const QUOTE_COLUMNS: &str = r#"
    id, company_id, quote_number, client_id, status, issue_date, expiration_date,
    tax_rate, subtotal, tax_amount, total_amount, notes, terms, created_by, created_at, updated_at
"#;

fn check_tax_rate(rate: Decimal) -> AppResult<()> {
    validate_tax_rate(rate).map_err(|msg| AppError::validation("tax_rate", msg, "Taux de taxe invalide"))
}

/// Lock a tenant's quote for the rest of the transaction
pub(crate) async fn lock_quote(conn: &mut PgConnection, company_id: Uuid, quote_id: Uuid) -> AppResult<Quote> {
    sqlx::query_as::<_, Quote>(&format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1 AND company_id = $2 FOR UPDATE"
    ))
    .bind(quote_id)
    .bind(company_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Quote".to_string()))
}

impl QuoteService {
    /// Create a new QuoteService instance
    pub fn new(db: PgPool, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Create a DRAFT quote with a fresh QT number
    pub async fn create_quote(&self, tenant: &TenantContext, input: CreateQuoteInput) -> AppResult<QuoteDetail> {
        if let Some(rate) = input.tax_rate {
            check_tax_rate(rate)?;
        }
        line_items::validate_line_inputs(&input.line_items)?;

        let detail = with_number_retry(&self.retry, DocumentSeries::Quote, || self.create_once(tenant, &input)).await?;

        tracing::info!(
            company_id = %tenant.company_id,
            quote_number = %detail.quote.quote_number,
            "Quote created"
        );

        Ok(detail)
    }

    async fn create_once(&self, tenant: &TenantContext, input: &CreateQuoteInput) -> AppResult<QuoteDetail> {
        let mut tx = self.db.begin().await?;

        ensure_client(&mut *tx, tenant.company_id, input.client_id).await?;
        let tax_rate = match input.tax_rate {
            Some(rate) => rate,
            None => company_defaults(&mut *tx, tenant.company_id).await?.sales_tax_rate,
        };
        let lines = price_lines(&mut *tx, tenant.company_id, &input.line_items, PriceSource::Selling).await?;

        let detail = self
            .insert_quote(
                &mut *tx,
                tenant,
                NewQuote {
                    client_id: input.client_id,
                    issue_date: input.issue_date.unwrap_or_else(|| Utc::now().date_naive()),
                    expiration_date: input.expiration_date,
                    tax_rate,
                    notes: input.notes.clone(),
                    terms: input.terms.clone(),
                },
                &lines,
            )
            .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::QuoteCreated,
            json!({
                "quote_id": detail.quote.id,
                "quote_number": detail.quote.quote_number,
                "client_id": detail.quote.client_id,
                "total_amount": detail.quote.total_amount,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(detail)
    }

    async fn insert_quote(
        &self,
        conn: &mut PgConnection,
        tenant: &TenantContext,
        header: NewQuote,
        lines: &[PricedLine],
    ) -> AppResult<QuoteDetail> {
        let totals = totals_of(lines, header.tax_rate, Decimal::ZERO);
        let number = issue_number(&mut *conn, tenant.company_id, DocumentSeries::Quote).await?;

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            INSERT INTO quotes (
                company_id, quote_number, client_id, status, issue_date, expiration_date,
                tax_rate, subtotal, tax_amount, total_amount, notes, terms, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(tenant.company_id)
        .bind(&number)
        .bind(header.client_id)
        .bind(QuoteStatus::Draft.as_str())
        .bind(header.issue_date)
        .bind(header.expiration_date)
        .bind(header.tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&header.notes)
        .bind(&header.terms)
        .bind(tenant.actor_id)
        .fetch_one(&mut *conn)
        .await?;

        let line_items = replace_lines(&mut *conn, SalesLines::Quote, quote.id, lines).await?;
        Ok(QuoteDetail { quote, line_items })
    }

    /// Get a quote with its lines
    pub async fn get_quote(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<QuoteDetail> {
        let mut conn = self.db.acquire().await?;

        let quote = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1 AND company_id = $2"
        ))
        .bind(quote_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Quote".to_string()))?;

        let line_items = fetch_lines(&mut *conn, SalesLines::Quote, quote.id).await?;
        Ok(QuoteDetail { quote, line_items })
    }

    /// List quote headers, newest first
    pub async fn list_quotes(&self, tenant: &TenantContext, filter: QuoteFilter) -> AppResult<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>(&format!(
            r#"
            SELECT {QUOTE_COLUMNS} FROM quotes
            WHERE company_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::UUID IS NULL OR client_id = $3)
            ORDER BY created_at DESC, quote_number DESC
            "#
        ))
        .bind(tenant.company_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(quotes)
    }

    /// Edit a quote that has not been converted yet
    pub async fn update_quote(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
        input: UpdateQuoteInput,
    ) -> AppResult<QuoteDetail> {
        if let Some(rate) = input.tax_rate {
            check_tax_rate(rate)?;
        }

        let mut tx = self.db.begin().await?;

        let current = lock_quote(&mut *tx, tenant.company_id, quote_id).await?;
        if !current.status.is_editable() {
            return Err(TransitionError::Locked("quote").into());
        }

        if let Some(client_id) = input.client_id {
            ensure_client(&mut *tx, tenant.company_id, client_id).await?;
        }

        let lines: Vec<PricedLine> = match &input.line_items {
            Some(inputs) => price_lines(&mut *tx, tenant.company_id, inputs, PriceSource::Selling).await?,
            None => fetch_lines(&mut *tx, SalesLines::Quote, quote_id)
                .await?
                .iter()
                .map(PricedLine::from)
                .collect(),
        };

        let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
        let totals = totals_of(&lines, tax_rate, Decimal::ZERO);

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            UPDATE quotes SET
                client_id = COALESCE($3, client_id),
                issue_date = COALESCE($4, issue_date),
                expiration_date = COALESCE($5, expiration_date),
                tax_rate = $6,
                subtotal = $7,
                tax_amount = $8,
                total_amount = $9,
                notes = COALESCE($10, notes),
                terms = COALESCE($11, terms),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .bind(tenant.company_id)
        .bind(input.client_id)
        .bind(input.issue_date)
        .bind(input.expiration_date)
        .bind(tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .bind(&input.terms)
        .fetch_one(&mut *tx)
        .await?;

        let line_items = match input.line_items {
            Some(_) => replace_lines(&mut *tx, SalesLines::Quote, quote_id, &lines).await?,
            None => fetch_lines(&mut *tx, SalesLines::Quote, quote_id).await?,
        };

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::QuoteUpdated,
            json!({
                "quote_id": quote.id,
                "quote_number": quote.quote_number,
                "lines_replaced": input.line_items.is_some(),
                "total_amount": { "old": current.total_amount, "new": quote.total_amount },
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(QuoteDetail { quote, line_items })
    }

    /// DRAFT → SENT
    pub async fn send_quote(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<Quote> {
        self.change_status(tenant, quote_id, QuoteAction::Send).await
    }

    /// SENT → ACCEPTED
    pub async fn accept_quote(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<Quote> {
        self.change_status(tenant, quote_id, QuoteAction::Accept).await
    }

    /// SENT → REJECTED
    pub async fn reject_quote(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<Quote> {
        self.change_status(tenant, quote_id, QuoteAction::Reject).await
    }

    async fn change_status(&self, tenant: &TenantContext, quote_id: Uuid, action: QuoteAction) -> AppResult<Quote> {
        let mut tx = self.db.begin().await?;

        let current = lock_quote(&mut *tx, tenant.company_id, quote_id).await?;
        let next = current.status.apply(action)?;

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            UPDATE quotes SET status = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .bind(tenant.company_id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::QuoteStatusChanged,
            json!({
                "quote_id": quote.id,
                "quote_number": quote.quote_number,
                "action": action.as_str(),
                "old_status": current.status.as_str(),
                "new_status": next.as_str(),
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            quote_number = %quote.quote_number,
            from = current.status.as_str(),
            to = next.as_str(),
            "Quote status changed"
        );

        Ok(quote)
    }

    /// Copy a quote into a new DRAFT with its own number, dated today
    pub async fn duplicate_quote(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<QuoteDetail> {
        let source = self.get_quote(tenant, quote_id).await?;
        let lines: Vec<PricedLine> = source.line_items.iter().map(PricedLine::from).collect();

        with_number_retry(&self.retry, DocumentSeries::Quote, || {
            self.duplicate_once(tenant, &source.quote, &lines)
        })
        .await
    }

    async fn duplicate_once(&self, tenant: &TenantContext, source: &Quote, lines: &[PricedLine]) -> AppResult<QuoteDetail> {
        let mut tx = self.db.begin().await?;

        let detail = self
            .insert_quote(
                &mut *tx,
                tenant,
                NewQuote {
                    client_id: source.client_id,
                    issue_date: Utc::now().date_naive(),
                    expiration_date: None,
                    tax_rate: source.tax_rate,
                    notes: source.notes.clone(),
                    terms: source.terms.clone(),
                },
                lines,
            )
            .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::QuoteCreated,
            json!({
                "quote_id": detail.quote.id,
                "quote_number": detail.quote.quote_number,
                "duplicated_from": source.quote_number,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(detail)
    }
}

struct NewQuote {
    client_id: Uuid,
    issue_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
    tax_rate: Decimal,
    notes: Option<String>,
    terms: Option<String>,
}
