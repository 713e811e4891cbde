//! HTTP handler for reserving document numbers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::DocumentSeries;
use crate::services::numbering::{IssuedNumber, NumberingService, RetryPolicy};
use crate::AppState;

/// Reserve the next number of a series (`quote`, `invoice`, `purchase-order`, ...)
pub async fn issue_document_number(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(series): Path<String>,
) -> AppResult<(StatusCode, Json<IssuedNumber>)> {
    let series: DocumentSeries = series.parse()?;
    let service = NumberingService::new(state.db, RetryPolicy::from(state.config.numbering));
    let issued = service.issue(&current_user.tenant(), series).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}
