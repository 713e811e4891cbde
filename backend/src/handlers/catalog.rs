//! HTTP handlers for products, categories, locations, clients and suppliers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::catalog::{
    CatalogService, Category, CategoryInput, Client, CreateClientInput, CreateLocationInput, CreateProductInput, CreateSupplierInput,
    ImportReport, Location, Product, ProductFilter, Supplier, UpdateProductInput,
};
use crate::AppState;

/// Largest CSV accepted by the product import
const MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;

// ============================================================================
// Products
// ============================================================================

/// List products, optionally filtered by name or SKU
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let service = CatalogService::new(state.db);
    let products = service.list_products(&current_user.tenant(), filter).await?;
    Ok(Json(products))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let service = CatalogService::new(state.db);
    let product = service.create_product(&current_user.tenant(), input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product
pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = CatalogService::new(state.db);
    let product = service.get_product(&current_user.tenant(), product_id).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let service = CatalogService::new(state.db);
    let product = service
        .update_product(&current_user.tenant(), product_id, input)
        .await?;
    Ok(Json(product))
}

/// Delete a product that nothing references
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.db);
    service.delete_product(&current_user.tenant(), product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Import products from an uploaded CSV (`csv_file` or `file` field)
pub async fn import_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    let mut content: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("Failed to read upload: {}", e)))?
    {
        if !matches!(field.name(), Some("csv_file") | Some("file")) {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::ValidationError(format!("Failed to read file bytes: {}", e)))?;
        if bytes.len() > MAX_IMPORT_BYTES {
            return Err(AppError::validation(
                "csv_file",
                "File too large (max 5MB)",
                "Fichier trop volumineux (5 Mo maximum)",
            ));
        }

        let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
            AppError::validation("csv_file", "File must be UTF-8 text", "Le fichier doit être encodé en UTF-8")
        })?;
        content = Some(text);
        break;
    }

    let content = content.ok_or_else(|| {
        AppError::validation("csv_file", "No CSV file uploaded", "Aucun fichier CSV envoyé")
    })?;

    let service = CatalogService::new(state.db);
    let report = service.import_products(&current_user.tenant(), &content).await?;
    Ok(Json(report))
}

// ============================================================================
// Categories
// ============================================================================

/// List categories with product counts
pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    let service = CatalogService::new(state.db);
    let categories = service.list_categories(&current_user.tenant()).await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let service = CatalogService::new(state.db);
    let category = service.create_category(&current_user.tenant(), input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn rename_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    let service = CatalogService::new(state.db);
    let category = service
        .rename_category(&current_user.tenant(), category_id, input)
        .await?;
    Ok(Json(category))
}

/// Delete a category no product uses
pub async fn delete_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.db);
    service.delete_category(&current_user.tenant(), category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Locations
// ============================================================================

/// List locations
pub async fn list_locations(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Location>>> {
    let service = CatalogService::new(state.db);
    let locations = service.list_locations(&current_user.tenant()).await?;
    Ok(Json(locations))
}

/// Create a location
pub async fn create_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<(StatusCode, Json<Location>)> {
    let service = CatalogService::new(state.db);
    let location = service.create_location(&current_user.tenant(), input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// Delete an empty, unreferenced location
pub async fn delete_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(location_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.db);
    service.delete_location(&current_user.tenant(), location_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Clients & suppliers
// ============================================================================

pub async fn list_clients(State(state): State<AppState>, current_user: CurrentUser) -> AppResult<Json<Vec<Client>>> {
    let service = CatalogService::new(state.db);
    let clients = service.list_clients(&current_user.tenant()).await?;
    Ok(Json(clients))
}

pub async fn create_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateClientInput>,
) -> AppResult<(StatusCode, Json<Client>)> {
    let service = CatalogService::new(state.db);
    let client = service.create_client(&current_user.tenant(), input).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    let service = CatalogService::new(state.db);
    let suppliers = service.list_suppliers(&current_user.tenant()).await?;
    Ok(Json(suppliers))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let service = CatalogService::new(state.db);
    let supplier = service.create_supplier(&current_user.tenant(), input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}
