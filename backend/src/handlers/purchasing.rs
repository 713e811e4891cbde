//! HTTP handlers for purchase orders and receiving

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::numbering::RetryPolicy;
use crate::services::purchasing::{
    CreatePurchaseOrderInput, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderFilter, PurchasingService,
    ReceiveItemsInput, StockAddition, UpdatePurchaseOrderInput,
};
use crate::AppState;

fn purchasing_service(state: &AppState) -> PurchasingService {
    PurchasingService::new(state.db.clone(), RetryPolicy::from(state.config.numbering))
}

/// List purchase orders
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<PurchaseOrderFilter>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let orders = purchasing_service(&state)
        .list_purchase_orders(&current_user.tenant(), filter)
        .await?;
    Ok(Json(orders))
}

/// Create a draft purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrderDetail>)> {
    let order = purchasing_service(&state)
        .create_purchase_order(&current_user.tenant(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get a purchase order with its lines
pub async fn get_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let order = purchasing_service(&state)
        .get_purchase_order(&current_user.tenant(), po_id)
        .await?;
    Ok(Json(order))
}

/// Update a purchase order
pub async fn update_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let order = purchasing_service(&state)
        .update_purchase_order(&current_user.tenant(), po_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn send_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = purchasing_service(&state)
        .send_purchase_order(&current_user.tenant(), po_id)
        .await?;
    Ok(Json(order))
}

pub async fn confirm_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = purchasing_service(&state)
        .confirm_purchase_order(&current_user.tenant(), po_id)
        .await?;
    Ok(Json(order))
}

pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = purchasing_service(&state)
        .cancel_purchase_order(&current_user.tenant(), po_id)
        .await?;
    Ok(Json(order))
}

/// Record received quantities
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
    Json(input): Json<ReceiveItemsInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let order = purchasing_service(&state)
        .receive_line_items(&current_user.tenant(), po_id, input)
        .await?;
    Ok(Json(order))
}

/// Shelve a fully received order at its receiving location
pub async fn add_purchase_order_to_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<StockAddition>> {
    let addition = purchasing_service(&state)
        .add_stock_to_inventory(&current_user.tenant(), po_id)
        .await?;
    Ok(Json(addition))
}
