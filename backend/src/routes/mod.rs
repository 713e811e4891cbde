//! Route definitions for the Stockroom back-office API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected_routes().route_layer(middleware::from_fn_with_state(state, auth_middleware)))
}

/// Everything behind the JWT middleware
fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/stock", stock_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/locations", location_routes())
        .nest("/clients", client_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/quotes", quote_routes())
        .nest("/invoices", invoice_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .route("/audit", get(handlers::list_audit_entries))
        .route("/numbers/:series", post(handlers::issue_document_number))
}

/// Stock ledger routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock_levels))
        .route("/adjust", post(handlers::adjust_stock))
        .route("/transfer", post(handlers::transfer_stock))
        .route("/history", get(handlers::get_stock_history))
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/import", post(handlers::import_products))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
}

/// Product category routes
fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories).post(handlers::create_category))
        .route(
            "/:category_id",
            put(handlers::rename_category).delete(handlers::delete_category),
        )
}

/// Location routes
fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_locations).post(handlers::create_location))
        .route("/:location_id", delete(handlers::delete_location))
}

fn client_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_clients).post(handlers::create_client))
}

fn supplier_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
}

/// Quote routes
fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_quotes).post(handlers::create_quote))
        .route("/:quote_id", get(handlers::get_quote).put(handlers::update_quote))
        .route("/:quote_id/send", post(handlers::send_quote))
        .route("/:quote_id/accept", post(handlers::accept_quote))
        .route("/:quote_id/reject", post(handlers::reject_quote))
        .route("/:quote_id/duplicate", post(handlers::duplicate_quote))
        .route("/:quote_id/convert", post(handlers::convert_quote))
}

/// Invoice and payment routes
fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_invoices).post(handlers::create_invoice))
        .route("/refresh-overdue", post(handlers::refresh_overdue_invoices))
        .route("/:invoice_id", get(handlers::get_invoice).put(handlers::update_invoice))
        .route("/:invoice_id/issue", post(handlers::issue_invoice))
        .route("/:invoice_id/payments", post(handlers::record_payment))
}

/// Purchase order routes
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_purchase_orders).post(handlers::create_purchase_order))
        .route(
            "/:po_id",
            get(handlers::get_purchase_order).put(handlers::update_purchase_order),
        )
        .route("/:po_id/send", post(handlers::send_purchase_order))
        .route("/:po_id/confirm", post(handlers::confirm_purchase_order))
        .route("/:po_id/cancel", post(handlers::cancel_purchase_order))
        .route("/:po_id/receive", post(handlers::receive_purchase_order))
        .route("/:po_id/add-to-inventory", post(handlers::add_purchase_order_to_inventory))
}
