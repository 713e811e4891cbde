//! Payment and stock-reduction coordinator
//!
//! Two flows end with stock leaving the shelves: a payment that settles an
//! invoice, and converting a quote when `sales.reduce_stock_on_conversion`
//! is on. Both go through [`reduce_stock_once`], whose conditional write on
//! `invoices.stock_reduced` lets exactly one transaction win.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    check_payment, transition, validate_money, AuditAction, DocumentSeries, InvoiceStatus, PaymentMethod,
    QuoteStatus, TenantContext,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::SalesConfig;
use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::invoice::{
    default_due_date, insert_invoice, load_detail, lock_invoice, Invoice, InvoiceDetail, NewInvoice, Payment,
    INVOICE_COLUMNS,
};
use crate::services::line_items::{company_defaults, fetch_lines, PricedLine, SalesLines};
use crate::services::numbering::{with_number_retry, RetryPolicy};
use crate::services::quote::lock_quote;
use crate::services::stock::{bulk_reduce, DocumentRef, LineReduction, StockLine};

/// Payment coordinator
#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
    retry: RetryPolicy,
    sales: SalesConfig,
}

/// Input for recording a payment
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    /// Defaults to today
    pub payment_date: Option<NaiveDate>,
    /// Defaults to bank transfer
    #[serde(default)]
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// What a payment or conversion did
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub invoice: InvoiceDetail,
    /// Present only when this call took the stock off the shelves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_reductions: Option<Vec<LineReduction>>,
}

/// Flip `stock_reduced` and, if this call flipped it, reduce stock for
/// every line of the invoice on the same transaction.
///
/// Returns `None` when another transaction already reduced this invoice.
pub async fn reduce_stock_once(
    conn: &mut PgConnection,
    tenant: &TenantContext,
    invoice_id: Uuid,
    invoice_number: &str,
) -> AppResult<Option<Vec<LineReduction>>> {
    let flipped = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE invoices SET stock_reduced = TRUE, updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND NOT stock_reduced
        RETURNING id
        "#,
    )
    .bind(invoice_id)
    .bind(tenant.company_id)
    .fetch_optional(&mut *conn)
    .await?;

    if flipped.is_none() {
        tracing::debug!(invoice_number, "Stock already reduced for invoice");
        return Ok(None);
    }

    let lines = sqlx::query_as::<_, StockLine>(
        "SELECT product_id, quantity FROM invoice_line_items WHERE invoice_id = $1",
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    let source = DocumentRef {
        kind: "invoice",
        id: invoice_id,
        number: invoice_number.to_string(),
    };
    let report = bulk_reduce(&mut *conn, tenant, &lines, &source).await?;

    let shortfalls = report.iter().filter(|r| r.shortfall > 0).count();
    tracing::info!(
        invoice_number,
        products = report.len(),
        shortfalls,
        "Stock reduced for invoice"
    );

    Ok(Some(report))
}

/// Re-derive an invoice's status against `today` and apply the resulting
/// events on the caller's transaction. The invoice must already be locked.
pub async fn apply_transition(
    conn: &mut PgConnection,
    tenant: &TenantContext,
    invoice: Invoice,
    today: NaiveDate,
) -> AppResult<(Invoice, Option<Vec<LineReduction>>)> {
    let next = transition(&invoice.state(), today);

    let mut invoice = if next.status != invoice.status || next.paid_date != invoice.paid_date {
        let updated = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET status = $3, paid_date = $4, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice.id)
        .bind(tenant.company_id)
        .bind(next.status.as_str())
        .bind(next.paid_date)
        .fetch_one(&mut *conn)
        .await?;

        if next.changed() {
            audit::record(
                &mut *conn,
                tenant,
                AuditAction::InvoiceStatusChanged,
                json!({
                    "invoice_id": updated.id,
                    "invoice_number": updated.invoice_number,
                    "old_status": invoice.status.as_str(),
                    "new_status": updated.status.as_str(),
                    "events": next.events,
                }),
            )
            .await?;
        }
        updated
    } else {
        invoice
    };

    let reductions = if next.reduction_due() {
        let report = reduce_stock_once(&mut *conn, tenant, invoice.id, &invoice.invoice_number).await?;
        invoice.stock_reduced = true;
        report
    } else {
        None
    };

    Ok((invoice, reductions))
}

impl PaymentService {
    /// Create a new PaymentService instance
    pub fn new(db: PgPool, retry: RetryPolicy, sales: SalesConfig) -> Self {
        Self { db, retry, sales }
    }

    /// Record a payment against an invoice.
    ///
    /// The invoice row is locked for the whole transaction, so concurrent
    /// payments on one invoice apply one after the other and each sees the
    /// balance left by the previous one.
    pub async fn record_payment(
        &self,
        tenant: &TenantContext,
        invoice_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<SettlementOutcome> {
        validate_money(input.amount).map_err(|msg| AppError::validation("amount", msg, "Montant invalide"))?;

        let mut tx = self.db.begin().await?;

        let invoice = lock_invoice(&mut *tx, tenant.company_id, invoice_id).await?;
        check_payment(input.amount, invoice.amount_due())?;

        let today = Utc::now().date_naive();
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (company_id, invoice_id, amount, payment_date, method, reference, notes, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, invoice_id, amount, payment_date, method, reference, notes, recorded_by, created_at
            "#,
        )
        .bind(tenant.company_id)
        .bind(invoice_id)
        .bind(input.amount)
        .bind(input.payment_date.unwrap_or(today))
        .bind(input.method.as_str())
        .bind(&input.reference)
        .bind(&input.notes)
        .bind(tenant.actor_id)
        .fetch_one(&mut *tx)
        .await?;

        let paid = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET
                amount_paid = (SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(tenant.company_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::PaymentRecorded,
            json!({
                "invoice_id": paid.id,
                "invoice_number": paid.invoice_number,
                "payment_id": payment.id,
                "amount": payment.amount,
                "method": payment.method.as_str(),
                "amount_paid": paid.amount_paid,
                "amount_due": paid.amount_due(),
            }),
        )
        .await?;

        let (invoice, stock_reductions) = apply_transition(&mut *tx, tenant, paid, today).await?;
        let detail = load_detail(&mut *tx, invoice).await?;

        tx.commit().await?;

        tracing::info!(
            invoice_number = %detail.invoice.invoice_number,
            amount = %payment.amount,
            status = detail.invoice.status.as_str(),
            "Payment recorded"
        );

        Ok(SettlementOutcome {
            invoice: detail,
            stock_reductions,
        })
    }

    /// Turn an ACCEPTED quote into an UNPAID invoice
    pub async fn convert_quote(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<SettlementOutcome> {
        let outcome =
            with_number_retry(&self.retry, DocumentSeries::Invoice, || self.convert_once(tenant, quote_id)).await?;

        tracing::info!(
            company_id = %tenant.company_id,
            invoice_number = %outcome.invoice.invoice.invoice_number,
            stock_reduced = outcome.invoice.invoice.stock_reduced,
            "Quote converted to invoice"
        );

        Ok(outcome)
    }

    async fn convert_once(&self, tenant: &TenantContext, quote_id: Uuid) -> AppResult<SettlementOutcome> {
        let mut tx = self.db.begin().await?;

        let quote = lock_quote(&mut *tx, tenant.company_id, quote_id).await?;
        quote.status.check_convertible()?;

        let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM invoices WHERE quote_id = $1")
            .bind(quote_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyConverted);
        }

        let defaults = company_defaults(&mut *tx, tenant.company_id).await?;
        let lines: Vec<PricedLine> = fetch_lines(&mut *tx, SalesLines::Quote, quote_id)
            .await?
            .iter()
            .map(PricedLine::from)
            .collect();

        let today = Utc::now().date_naive();
        let due_date = default_due_date(today, &self.sales);

        let (invoice, _) = insert_invoice(
            &mut *tx,
            tenant,
            NewInvoice {
                client_id: quote.client_id,
                quote_id: Some(quote.id),
                status: InvoiceStatus::Draft.issue()?,
                issue_date: today,
                due_date,
                tax_rate: quote.tax_rate,
                notes: quote.notes.clone(),
                terms: quote.terms.clone().or(defaults.payment_terms),
            },
            &lines,
        )
        .await?;

        sqlx::query("UPDATE quotes SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(quote_id)
            .bind(QuoteStatus::Invoiced.as_str())
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::QuoteConverted,
            json!({
                "quote_id": quote.id,
                "quote_number": quote.quote_number,
                "invoice_id": invoice.id,
                "invoice_number": invoice.invoice_number,
            }),
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
                "quote_id": quote.id,
                "status": invoice.status.as_str(),
                "total_amount": invoice.total_amount,
            }),
        )
        .await?;

        let stock_reductions = if self.sales.reduce_stock_on_conversion && !lines.is_empty() {
            reduce_stock_once(&mut *tx, tenant, invoice.id, &invoice.invoice_number).await?
        } else {
            None
        };

        let invoice = Invoice {
            stock_reduced: invoice.stock_reduced || stock_reductions.is_some(),
            ..invoice
        };
        let detail = load_detail(&mut *tx, invoice).await?;

        tx.commit().await?;
        Ok(SettlementOutcome {
            invoice: detail,
            stock_reductions,
        })
    }
}
