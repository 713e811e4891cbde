//! HTTP handlers for quotes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::numbering::RetryPolicy;
use crate::services::payment::{PaymentService, SettlementOutcome};
use crate::services::quote::{CreateQuoteInput, Quote, QuoteDetail, QuoteFilter, QuoteService, UpdateQuoteInput};
use crate::AppState;

fn quote_service(state: &AppState) -> QuoteService {
    QuoteService::new(state.db.clone(), RetryPolicy::from(state.config.numbering))
}

/// List quotes
pub async fn list_quotes(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<QuoteFilter>,
) -> AppResult<Json<Vec<Quote>>> {
    let quotes = quote_service(&state).list_quotes(&current_user.tenant(), filter).await?;
    Ok(Json(quotes))
}

/// Create a draft quote
pub async fn create_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateQuoteInput>,
) -> AppResult<(StatusCode, Json<QuoteDetail>)> {
    let quote = quote_service(&state).create_quote(&current_user.tenant(), input).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// Get a quote with its lines
pub async fn get_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> AppResult<Json<QuoteDetail>> {
    let quote = quote_service(&state).get_quote(&current_user.tenant(), quote_id).await?;
    Ok(Json(quote))
}

/// Update a quote
pub async fn update_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
    Json(input): Json<UpdateQuoteInput>,
) -> AppResult<Json<QuoteDetail>> {
    let quote = quote_service(&state)
        .update_quote(&current_user.tenant(), quote_id, input)
        .await?;
    Ok(Json(quote))
}

pub async fn send_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> AppResult<Json<Quote>> {
    let quote = quote_service(&state).send_quote(&current_user.tenant(), quote_id).await?;
    Ok(Json(quote))
}

pub async fn accept_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> AppResult<Json<Quote>> {
    let quote = quote_service(&state).accept_quote(&current_user.tenant(), quote_id).await?;
    Ok(Json(quote))
}

pub async fn reject_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> AppResult<Json<Quote>> {
    let quote = quote_service(&state).reject_quote(&current_user.tenant(), quote_id).await?;
    Ok(Json(quote))
}

/// Copy a quote into a new draft
pub async fn duplicate_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<QuoteDetail>)> {
    let quote = quote_service(&state)
        .duplicate_quote(&current_user.tenant(), quote_id)
        .await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// Convert an accepted quote into an invoice
pub async fn convert_quote(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quote_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<SettlementOutcome>)> {
    let service = PaymentService::new(state.db, RetryPolicy::from(state.config.numbering), state.config.sales);
    let outcome = service.convert_quote(&current_user.tenant(), quote_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
