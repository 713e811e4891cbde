//! HTTP handlers for invoices and payments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::invoice::{
    CreateInvoiceInput, Invoice, InvoiceDetail, InvoiceFilter, InvoiceService, OverdueSweep, UpdateInvoiceInput,
};
use crate::services::numbering::RetryPolicy;
use crate::services::payment::{PaymentService, RecordPaymentInput, SettlementOutcome};
use crate::AppState;

fn invoice_service(state: &AppState) -> InvoiceService {
    InvoiceService::new(
        state.db.clone(),
        RetryPolicy::from(state.config.numbering),
        state.config.sales,
    )
}

/// List invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<InvoiceFilter>,
) -> AppResult<Json<Vec<Invoice>>> {
    let invoices = invoice_service(&state)
        .list_invoices(&current_user.tenant(), filter)
        .await?;
    Ok(Json(invoices))
}

/// Create an invoice without a quote
pub async fn create_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<(StatusCode, Json<InvoiceDetail>)> {
    let invoice = invoice_service(&state)
        .create_invoice(&current_user.tenant(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Get an invoice with lines and payments
pub async fn get_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = invoice_service(&state)
        .get_invoice(&current_user.tenant(), invoice_id)
        .await?;
    Ok(Json(invoice))
}

/// Update an invoice
pub async fn update_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<UpdateInvoiceInput>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = invoice_service(&state)
        .update_invoice(&current_user.tenant(), invoice_id, input)
        .await?;
    Ok(Json(invoice))
}

/// Issue a draft invoice
pub async fn issue_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = invoice_service(&state)
        .issue_invoice(&current_user.tenant(), invoice_id)
        .await?;
    Ok(Json(invoice))
}

/// Record a payment
pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<(StatusCode, Json<SettlementOutcome>)> {
    let service = PaymentService::new(state.db, RetryPolicy::from(state.config.numbering), state.config.sales);
    let outcome = service
        .record_payment(&current_user.tenant(), invoice_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Re-derive the status of every open invoice
pub async fn refresh_overdue_invoices(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<OverdueSweep>> {
    let today = Utc::now().date_naive();
    let sweep = invoice_service(&state)
        .refresh_overdue(&current_user.tenant(), today)
        .await?;
    Ok(Json(sweep))
}
