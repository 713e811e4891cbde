//! HTTP handlers for the stock ledger

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::audit::AuditEntry;
use crate::services::stock::{
    AdjustStockInput, StockFilter, StockHistoryQuery, StockLevel, StockService, StockSnapshot, TransferResult,
    TransferStockInput,
};
use crate::AppState;

/// Stock levels per product and location
pub async fn list_stock_levels(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockLevel>>> {
    let service = StockService::new(state.db);
    let levels = service.list_levels(&current_user.tenant(), filter).await?;
    Ok(Json(levels))
}

/// Add, remove or set stock at one location
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<StockSnapshot>> {
    let service = StockService::new(state.db);
    let snapshot = service.adjust(&current_user.tenant(), input).await?;
    Ok(Json(snapshot))
}

/// Move stock between two locations
pub async fn transfer_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferStockInput>,
) -> AppResult<Json<TransferResult>> {
    let service = StockService::new(state.db);
    let result = service.transfer(&current_user.tenant(), input).await?;
    Ok(Json(result))
}

/// Movement history of a product
pub async fn get_stock_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<StockHistoryQuery>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let service = StockService::new(state.db);
    let entries = service.history(&current_user.tenant(), query).await?;
    Ok(Json(entries))
}
