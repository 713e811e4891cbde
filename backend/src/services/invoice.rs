//! Invoice service
//!
//! Status is derived, never set: every write that can move it (issue, edit,
//! payment, the overdue sweep) re-runs `shared::transition` through
//! [`payment::apply_transition`] so stock reduction fires from exactly one place.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    lines_editable, validate_tax_rate, AuditAction, DocumentSeries, InvoiceState, InvoiceStatus, PaymentMethod,
    TenantContext, TransitionError,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::config::SalesConfig;
use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::line_items::{
    self, company_defaults, ensure_client, fetch_lines, price_lines, replace_lines, totals_of, LineItem,
    LineItemInput, PriceSource, PricedLine, SalesLines,
};
use crate::services::numbering::{issue_number, with_number_retry, RetryPolicy};
use crate::services::payment;

/// Invoice service
#[derive(Clone)]
pub struct InvoiceService {
    db: PgPool,
    retry: RetryPolicy,
    sales: SalesConfig,
}

/// Invoice header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub quote_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub stock_reduced: bool,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Fields the status machine reads
    pub fn state(&self) -> InvoiceState {
        InvoiceState {
            status: self.status,
            amount_paid: self.amount_paid,
            total_amount: self.total_amount,
            due_date: self.due_date,
            paid_date: self.paid_date,
            stock_reduced: self.stock_reduced,
        }
    }

    pub fn amount_due(&self) -> Decimal {
        shared::amount_due(self.total_amount, self.amount_paid)
    }
}

/// A recorded payment
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Invoice with lines and payments
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub amount_due: Decimal,
    pub line_items: Vec<LineItem>,
    pub payments: Vec<Payment>,
}

/// Input for creating an invoice directly
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceInput {
    pub client_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    /// Defaults to issue date plus the configured payment window
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
    /// Issue immediately instead of starting as a draft
    #[serde(default)]
    pub issue: bool,
}

/// Input for updating an invoice; lines are only replaceable while
/// nothing has been paid and no stock has left
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoiceInput {
    pub client_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

/// Filters for listing invoices
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
}

/// Result of the overdue sweep
#[derive(Debug, Clone, Serialize)]
pub struct OverdueSweep {
    pub examined: usize,
    pub updated: Vec<String>,
    pub failed: Vec<SweepFailure>,
}

/// An invoice the sweep could not re-derive
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub invoice_id: Uuid,
    pub error: String,
}

pub(crate) const INVOICE_COLUMNS: &str = r#"
    id, company_id, invoice_number, client_id, quote_id, status, issue_date, due_date, paid_date,
    tax_rate, subtotal, tax_amount, total_amount, amount_paid, stock_reduced, notes, terms,
    created_by, created_at, updated_at
"#;

fn check_tax_rate(rate: Decimal) -> AppResult<()> {
    validate_tax_rate(rate).map_err(|msg| AppError::validation("tax_rate", msg, "Taux de taxe invalide"))
}

/// Due date used when none is supplied
pub fn default_due_date(issue_date: NaiveDate, sales: &SalesConfig) -> NaiveDate {
    issue_date + Duration::days(sales.default_due_days)
}

/// Lock a tenant's invoice for the rest of the transaction
pub(crate) async fn lock_invoice(conn: &mut PgConnection, company_id: Uuid, invoice_id: Uuid) -> AppResult<Invoice> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND company_id = $2 FOR UPDATE"
    ))
    .bind(invoice_id)
    .bind(company_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Invoice".to_string()))
}

/// Load lines and payments around a header
pub(crate) async fn load_detail(conn: &mut PgConnection, invoice: Invoice) -> AppResult<InvoiceDetail> {
    let line_items = fetch_lines(&mut *conn, SalesLines::Invoice, invoice.id).await?;
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, invoice_id, amount, payment_date, method, reference, notes, recorded_by, created_at
        FROM payments
        WHERE invoice_id = $1
        ORDER BY payment_date, created_at
        "#,
    )
    .bind(invoice.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(InvoiceDetail {
        amount_due: invoice.amount_due(),
        invoice,
        line_items,
        payments,
    })
}

/// Header fields of an invoice about to be inserted
pub(crate) struct NewInvoice {
    pub client_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

/// Insert an invoice with a fresh INV number and its lines
pub(crate) async fn insert_invoice(
    conn: &mut PgConnection,
    tenant: &TenantContext,
    header: NewInvoice,
    lines: &[PricedLine],
) -> AppResult<(Invoice, Vec<LineItem>)> {
    let totals = totals_of(lines, header.tax_rate, Decimal::ZERO);
    let number = issue_number(&mut *conn, tenant.company_id, DocumentSeries::Invoice).await?;

    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        INSERT INTO invoices (
            company_id, invoice_number, client_id, quote_id, status, issue_date, due_date,
            tax_rate, subtotal, tax_amount, total_amount, notes, terms, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {INVOICE_COLUMNS}
        "#
    ))
    .bind(tenant.company_id)
    .bind(&number)
    .bind(header.client_id)
    .bind(header.quote_id)
    .bind(header.status.as_str())
    .bind(header.issue_date)
    .bind(header.due_date)
    .bind(header.tax_rate)
    .bind(totals.subtotal)
    .bind(totals.tax_amount)
    .bind(totals.total_amount)
    .bind(&header.notes)
    .bind(&header.terms)
    .bind(tenant.actor_id)
    .fetch_one(&mut *conn)
    .await?;

    let line_items = replace_lines(&mut *conn, SalesLines::Invoice, invoice.id, lines).await?;
    Ok((invoice, line_items))
}

impl InvoiceService {
    /// Create a new InvoiceService instance
    pub fn new(db: PgPool, retry: RetryPolicy, sales: SalesConfig) -> Self {
        Self { db, retry, sales }
    }

    /// Create an invoice without a quote, as DRAFT or already issued
    pub async fn create_invoice(&self, tenant: &TenantContext, input: CreateInvoiceInput) -> AppResult<InvoiceDetail> {
        if let Some(rate) = input.tax_rate {
            check_tax_rate(rate)?;
        }
        line_items::validate_line_inputs(&input.line_items)?;

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input.due_date.unwrap_or_else(|| default_due_date(issue_date, &self.sales));
        if due_date < issue_date {
            return Err(AppError::validation(
                "due_date",
                "Due date cannot be before the issue date",
                "La date d'échéance ne peut pas précéder la date d'émission",
            ));
        }

        let detail = with_number_retry(&self.retry, DocumentSeries::Invoice, || {
            self.create_once(tenant, &input, issue_date, due_date)
        })
        .await?;

        tracing::info!(
            company_id = %tenant.company_id,
            invoice_number = %detail.invoice.invoice_number,
            status = detail.invoice.status.as_str(),
            "Invoice created"
        );

        Ok(detail)
    }

    async fn create_once(
        &self,
        tenant: &TenantContext,
        input: &CreateInvoiceInput,
        issue_date: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<InvoiceDetail> {
        let mut tx = self.db.begin().await?;

        ensure_client(&mut *tx, tenant.company_id, input.client_id).await?;
        let defaults = company_defaults(&mut *tx, tenant.company_id).await?;
        let lines = price_lines(&mut *tx, tenant.company_id, &input.line_items, PriceSource::Selling).await?;

        let status = if input.issue {
            InvoiceStatus::Draft.issue()?
        } else {
            InvoiceStatus::Draft
        };

        let (invoice, _) = insert_invoice(
            &mut *tx,
            tenant,
            NewInvoice {
                client_id: input.client_id,
                quote_id: None,
                status,
                issue_date,
                due_date,
                tax_rate: input.tax_rate.unwrap_or(defaults.sales_tax_rate),
                notes: input.notes.clone(),
                terms: input.terms.clone().or(defaults.payment_terms),
            },
            &lines,
        )
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::InvoiceCreated,
            json!({
                "invoice_id": invoice.id,
                "invoice_number": invoice.invoice_number,
                "client_id": invoice.client_id,
                "status": invoice.status.as_str(),
                "total_amount": invoice.total_amount,
            }),
        )
        .await?;

        let detail = load_detail(&mut *tx, invoice).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Get an invoice with lines and payments
    pub async fn get_invoice(&self, tenant: &TenantContext, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let mut conn = self.db.acquire().await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND company_id = $2"
        ))
        .bind(invoice_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice".to_string()))?;

        load_detail(&mut *conn, invoice).await
    }

    /// List invoice headers, newest first
    pub async fn list_invoices(&self, tenant: &TenantContext, filter: InvoiceFilter) -> AppResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE company_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::UUID IS NULL OR client_id = $3)
            ORDER BY created_at DESC, invoice_number DESC
            "#
        ))
        .bind(tenant.company_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.client_id)
        .fetch_all(&self.db)
        .await?;

        Ok(invoices)
    }

    /// Edit header fields, and the lines while they are still editable.
    ///
    /// A changed due date or total re-derives the status.
    pub async fn update_invoice(
        &self,
        tenant: &TenantContext,
        invoice_id: Uuid,
        input: UpdateInvoiceInput,
    ) -> AppResult<InvoiceDetail> {
        if let Some(rate) = input.tax_rate {
            check_tax_rate(rate)?;
        }

        let mut tx = self.db.begin().await?;
        let current = lock_invoice(&mut *tx, tenant.company_id, invoice_id).await?;

        let reprices = input.line_items.is_some() || input.tax_rate.is_some();
        if reprices && !lines_editable(current.amount_paid, current.stock_reduced) {
            return Err(TransitionError::Locked("invoice").into());
        }

        if let Some(client_id) = input.client_id {
            ensure_client(&mut *tx, tenant.company_id, client_id).await?;
        }

        let due_date = input.due_date.unwrap_or(current.due_date);
        if due_date < current.issue_date {
            return Err(AppError::validation(
                "due_date",
                "Due date cannot be before the issue date",
                "La date d'échéance ne peut pas précéder la date d'émission",
            ));
        }

        let lines: Vec<PricedLine> = match &input.line_items {
            Some(inputs) => price_lines(&mut *tx, tenant.company_id, inputs, PriceSource::Selling).await?,
            None => fetch_lines(&mut *tx, SalesLines::Invoice, invoice_id)
                .await?
                .iter()
                .map(PricedLine::from)
                .collect(),
        };
        let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
        let totals = totals_of(&lines, tax_rate, Decimal::ZERO);

        let updated = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET
                client_id = COALESCE($3, client_id),
                due_date = $4,
                tax_rate = $5,
                subtotal = $6,
                tax_amount = $7,
                total_amount = $8,
                notes = COALESCE($9, notes),
                terms = COALESCE($10, terms),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(tenant.company_id)
        .bind(input.client_id)
        .bind(due_date)
        .bind(tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .bind(&input.terms)
        .fetch_one(&mut *tx)
        .await?;

        if input.line_items.is_some() {
            replace_lines(&mut *tx, SalesLines::Invoice, invoice_id, &lines).await?;
        }

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::InvoiceUpdated,
            json!({
                "invoice_id": updated.id,
                "invoice_number": updated.invoice_number,
                "lines_replaced": input.line_items.is_some(),
                "due_date": { "old": current.due_date, "new": updated.due_date },
                "total_amount": { "old": current.total_amount, "new": updated.total_amount },
            }),
        )
        .await?;

        let (invoice, _) = payment::apply_transition(&mut *tx, tenant, updated, Utc::now().date_naive()).await?;
        let detail = load_detail(&mut *tx, invoice).await?;

        tx.commit().await?;
        Ok(detail)
    }

    /// DRAFT → UNPAID
    pub async fn issue_invoice(&self, tenant: &TenantContext, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let mut tx = self.db.begin().await?;

        let current = lock_invoice(&mut *tx, tenant.company_id, invoice_id).await?;
        let next = current.status.issue()?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET status = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(tenant.company_id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::InvoiceStatusChanged,
            json!({
                "invoice_id": invoice.id,
                "invoice_number": invoice.invoice_number,
                "old_status": current.status.as_str(),
                "new_status": next.as_str(),
            }),
        )
        .await?;

        let detail = load_detail(&mut *tx, invoice).await?;
        tx.commit().await?;

        tracing::info!(invoice_number = %detail.invoice.invoice_number, status = next.as_str(), "Invoice issued");
        Ok(detail)
    }

    /// Re-derive every open invoice of the tenant against `today`.
    ///
    /// Each invoice gets its own transaction. A failing invoice is logged,
    /// reported in `failed`, and the sweep moves on.
    pub async fn refresh_overdue(&self, tenant: &TenantContext, today: NaiveDate) -> AppResult<OverdueSweep> {
        let open: Vec<String> = [InvoiceStatus::Unpaid, InvoiceStatus::PartiallyPaid, InvoiceStatus::Overdue]
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let candidates = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM invoices WHERE company_id = $1 AND status = ANY($2) ORDER BY invoice_number",
        )
        .bind(tenant.company_id)
        .bind(&open)
        .fetch_all(&self.db)
        .await?;

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for invoice_id in &candidates {
            match self.refresh_one(tenant, *invoice_id, today).await {
                Ok(Some(number)) => updated.push(number),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(invoice_id = %invoice_id, error = %err, "Invoice status refresh failed");
                    failed.push(SweepFailure {
                        invoice_id: *invoice_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            company_id = %tenant.company_id,
            examined = candidates.len(),
            updated = updated.len(),
            failed = failed.len(),
            "Invoice status sweep finished"
        );

        Ok(OverdueSweep {
            examined: candidates.len(),
            updated,
            failed,
        })
    }

    /// Re-derive one invoice; returns its number when the status moved
    async fn refresh_one(&self, tenant: &TenantContext, invoice_id: Uuid, today: NaiveDate) -> AppResult<Option<String>> {
        let mut tx = self.db.begin().await?;
        let current = lock_invoice(&mut *tx, tenant.company_id, invoice_id).await?;
        let before = current.status;
        let (invoice, _) = payment::apply_transition(&mut *tx, tenant, current, today).await?;
        tx.commit().await?;

        Ok((invoice.status != before).then_some(invoice.invoice_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn invoice(status: InvoiceStatus, paid: &str, total: &str) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            invoice_number: "INV-00001".to_string(),
            client_id: Uuid::new_v4(),
            quote_id: None,
            status,
            issue_date: now.date_naive(),
            due_date: now.date_naive(),
            paid_date: None,
            tax_rate: Decimal::ZERO,
            subtotal: dec(total),
            tax_amount: Decimal::ZERO,
            total_amount: dec(total),
            amount_paid: dec(paid),
            stock_reduced: false,
            notes: None,
            terms: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_default_due_date() {
        let sales = SalesConfig::default();
        let issued = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            default_due_date(issued, &sales),
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
        );
    }

    #[test]
    fn test_amount_due() {
        let inv = invoice(InvoiceStatus::PartiallyPaid, "300.00", "1000.00");
        assert_eq!(inv.amount_due(), dec("700.00"));
        assert_eq!(inv.state().amount_paid, dec("300.00"));
    }

    #[test]
    fn test_detail_serializes_flat() {
        let inv = invoice(InvoiceStatus::Unpaid, "0", "50.00");
        let detail = InvoiceDetail {
            amount_due: inv.amount_due(),
            invoice: inv,
            line_items: Vec::new(),
            payments: Vec::new(),
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["invoice_number"], "INV-00001");
        assert_eq!(value["status"], "UNPAID");
        assert!(value["payments"].as_array().unwrap().is_empty());
    }
}
