//! Catalog service: products, locations, clients and suppliers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{validate_money, validate_sku, AuditAction, TenantContext};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit;

/// Reorder threshold applied when none is given
pub const DEFAULT_REORDER_THRESHOLD: i32 = 10;

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Product record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub purchase_price: Decimal,
    pub reorder_threshold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub purchase_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_threshold: Option<i32>,
}

/// Input for updating a product
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_threshold: Option<i32>,
}

/// Product category, with the number of products filed under it
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Location record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
}

/// Client record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Supplier record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub payment_terms: Option<String>,
    pub lead_time_days: i32,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub payment_terms: Option<String>,
    #[validate(range(min = 0))]
    pub lead_time_days: Option<i32>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

/// Product listing filter
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
}

const PRODUCT_COLUMNS: &str = r#"
    id, company_id, category_id, name, sku, description, price, purchase_price,
    reorder_threshold, created_at, updated_at
"#;

const CATEGORY_COLUMNS: &str = r#"
    c.id, c.company_id, c.name, c.created_at,
    (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count
"#;

// ============================================================================
// CSV import
// ============================================================================

/// A parsed, valid import row
#[derive(Debug, Clone, PartialEq)]
pub struct ProductImportRow {
    pub line: usize,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub purchase_price: Decimal,
    pub reorder_threshold: i32,
}

/// A row that was not imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRowError {
    pub line: usize,
    pub message: String,
}

/// Outcome of a CSV import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub categories_created: usize,
    pub skipped: Vec<ImportRowError>,
    pub errors: Vec<ImportRowError>,
}

#[derive(Debug, Deserialize)]
struct RawImportRow {
    name: Option<String>,
    sku: Option<String>,
    category: Option<String>,
    price: Option<String>,
    purchase_price: Option<String>,
    reorder_threshold: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_amount(value: Option<String>, field: &str) -> Result<Decimal, String> {
    match non_empty(value) {
        None => Ok(Decimal::ZERO),
        Some(raw) => {
            let amount = Decimal::from_str(&raw).map_err(|_| format!("'{}' is not a valid {}", raw, field))?;
            validate_money(amount).map_err(|msg| format!("{}: {}", field, msg))?;
            Ok(amount)
        }
    }
}

/// Parse `name,sku,category,price,purchase_price,reorder_threshold` rows.
/// Every column but `name` is optional.
///
/// Line numbers count the header as line 1. Bad rows are collected and
/// returned next to the good ones; only an unreadable header fails the
/// whole file.
pub fn parse_product_csv(content: &str) -> AppResult<(Vec<ProductImportRow>, Vec<ImportRowError>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::ValidationError(format!("Unreadable CSV header: {}", e)))?;
    if !headers.iter().any(|h| h == "name") {
        return Err(AppError::validation(
            "csv_file",
            "CSV header must contain a 'name' column",
            "L'en-tête CSV doit contenir une colonne 'name'",
        ));
    }

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (index, result) in reader.deserialize::<RawImportRow>().enumerate() {
        let line = index + 2;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                errors.push(ImportRowError { line, message: e.to_string() });
                continue;
            }
        };

        let Some(name) = non_empty(raw.name) else {
            errors.push(ImportRowError {
                line,
                message: "'name' is a required field".to_string(),
            });
            continue;
        };

        let category = non_empty(raw.category);
        if category.as_ref().is_some_and(|c| c.chars().count() > 100) {
            errors.push(ImportRowError {
                line,
                message: "category name cannot exceed 100 characters".to_string(),
            });
            continue;
        }

        let sku = non_empty(raw.sku);
        if let Some(sku) = &sku {
            if let Err(msg) = validate_sku(sku) {
                errors.push(ImportRowError { line, message: msg.to_string() });
                continue;
            }
        }

        let parsed = parse_amount(raw.price, "price").and_then(|price| {
            let purchase_price = parse_amount(raw.purchase_price, "purchase_price")?;
            let reorder_threshold = match non_empty(raw.reorder_threshold) {
                None => DEFAULT_REORDER_THRESHOLD,
                Some(raw) => raw
                    .parse::<i32>()
                    .ok()
                    .filter(|t| *t >= 0)
                    .ok_or_else(|| format!("'{}' is not a valid reorder_threshold", raw))?,
            };
            Ok((price, purchase_price, reorder_threshold))
        });

        match parsed {
            Ok((price, purchase_price, reorder_threshold)) => rows.push(ProductImportRow {
                line,
                name,
                sku,
                category,
                price,
                purchase_price,
                reorder_threshold,
            }),
            Err(message) => errors.push(ImportRowError { line, message }),
        }
    }

    Ok((rows, errors))
}

fn check_product_fields(sku: Option<&str>, price: Option<Decimal>, purchase_price: Option<Decimal>) -> AppResult<()> {
    if let Some(sku) = sku {
        validate_sku(sku).map_err(|msg| AppError::validation("sku", msg, "SKU invalide"))?;
    }
    if let Some(price) = price {
        validate_money(price).map_err(|msg| AppError::validation("price", msg, "Prix invalide"))?;
    }
    if let Some(purchase_price) = purchase_price {
        validate_money(purchase_price)
            .map_err(|msg| AppError::validation("purchase_price", msg, "Prix d'achat invalide"))?;
    }
    Ok(())
}

/// Fail with `InvalidReference` unless the category belongs to the tenant
async fn ensure_category(conn: &mut PgConnection, company_id: Uuid, category_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1 AND company_id = $2)",
    )
    .bind(category_id)
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::InvalidReference("Category".to_string()));
    }
    Ok(())
}

/// Find a category by name, creating it on first use; `true` when created
async fn category_for_import(conn: &mut PgConnection, company_id: Uuid, name: &str) -> AppResult<(Uuid, bool)> {
    let row = sqlx::query_as::<_, (Uuid, bool)>(
        r#"
        INSERT INTO categories (company_id, name)
        VALUES ($1, $2)
        ON CONFLICT (company_id, name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, (xmax = 0) AS inserted
        "#,
    )
    .bind(company_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------------

    pub async fn create_product(&self, tenant: &TenantContext, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        let sku = non_empty(input.sku);
        check_product_fields(sku.as_deref(), Some(input.price), input.purchase_price)?;

        let mut tx = self.db.begin().await?;
        if let Some(category_id) = input.category_id {
            ensure_category(&mut *tx, tenant.company_id, category_id).await?;
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (company_id, name, sku, description, price, purchase_price, reorder_threshold, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(tenant.company_id)
        .bind(input.name.trim())
        .bind(&sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.purchase_price.unwrap_or(Decimal::ZERO))
        .bind(input.reorder_threshold.unwrap_or(DEFAULT_REORDER_THRESHOLD))
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("sku".to_string())
            } else {
                e.into()
            }
        })?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::ProductCreated,
            json!({ "product_id": product.id, "name": product.name, "sku": product.sku }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(company_id = %tenant.company_id, product_id = %product.id, "Product created");

        Ok(product)
    }

    pub async fn get_product(&self, tenant: &TenantContext, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND company_id = $2"
        ))
        .bind(product_id)
        .bind(tenant.company_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub async fn list_products(&self, tenant: &TenantContext, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let search = non_empty(filter.search).map(|s| format!("%{}%", s));

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE company_id = $1
              AND ($2::TEXT IS NULL OR name ILIKE $2 OR sku ILIKE $2)
              AND ($3::UUID IS NULL OR category_id = $3)
            ORDER BY name
            "#
        ))
        .bind(tenant.company_id)
        .bind(search)
        .bind(filter.category_id)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Update a product; price and threshold changes are audited with old
    /// and new values
    pub async fn update_product(
        &self,
        tenant: &TenantContext,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        let sku = non_empty(input.sku);
        check_product_fields(sku.as_deref(), input.price, input.purchase_price)?;

        let mut tx = self.db.begin().await?;
        if let Some(category_id) = input.category_id {
            ensure_category(&mut *tx, tenant.company_id, category_id).await?;
        }

        let before = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND company_id = $2 FOR UPDATE"
        ))
        .bind(product_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                sku = COALESCE($3, sku),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                purchase_price = COALESCE($6, purchase_price),
                reorder_threshold = COALESCE($7, reorder_threshold),
                category_id = COALESCE($8, category_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.purchase_price)
        .bind(input.reorder_threshold)
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("sku".to_string())
            } else {
                e.into()
            }
        })?;

        let mut changes = serde_json::Map::new();
        if before.price != product.price {
            changes.insert("price".into(), json!({ "old": before.price, "new": product.price }));
        }
        if before.purchase_price != product.purchase_price {
            changes.insert(
                "purchase_price".into(),
                json!({ "old": before.purchase_price, "new": product.purchase_price }),
            );
        }
        if before.reorder_threshold != product.reorder_threshold {
            changes.insert(
                "reorder_threshold".into(),
                json!({ "old": before.reorder_threshold, "new": product.reorder_threshold }),
            );
        }
        if before.name != product.name {
            changes.insert("name".into(), json!({ "old": before.name, "new": product.name }));
        }
        if before.sku != product.sku {
            changes.insert("sku".into(), json!({ "old": before.sku, "new": product.sku }));
        }
        if before.category_id != product.category_id {
            changes.insert(
                "category_id".into(),
                json!({ "old": before.category_id, "new": product.category_id }),
            );
        }

        if !changes.is_empty() {
            audit::record(
                &mut *tx,
                tenant,
                AuditAction::ProductUpdated,
                json!({ "product_id": product.id, "changes": changes }),
            )
            .await?;
        }

        tx.commit().await?;

        Ok(product)
    }

    /// Delete a product that nothing references
    pub async fn delete_product(&self, tenant: &TenantContext, product_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, name FROM products WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(product_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM stock WHERE product_id = $1)
                OR EXISTS(SELECT 1 FROM quote_line_items WHERE product_id = $1)
                OR EXISTS(SELECT 1 FROM invoice_line_items WHERE product_id = $1)
                OR EXISTS(SELECT 1 FROM purchase_order_line_items WHERE product_id = $1)
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        if referenced {
            return Err(AppError::Conflict {
                resource: "product".to_string(),
                message: "Product is referenced by stock or documents and cannot be deleted".to_string(),
                message_fr: "Ce produit est référencé par du stock ou des documents et ne peut pas être supprimé"
                    .to_string(),
            });
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::ProductDeleted,
            json!({ "product_id": product.0, "name": product.1 }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Import products from CSV in one transaction.
    ///
    /// Rows with a SKU already present in the catalog are skipped and
    /// reported; malformed rows are reported and never abort the import.
    /// Categories named in the file are created on first use.
    pub async fn import_products(&self, tenant: &TenantContext, content: &str) -> AppResult<ImportReport> {
        let (rows, errors) = parse_product_csv(content)?;

        let mut tx = self.db.begin().await?;
        let mut created = 0;
        let mut categories_created = 0;
        let mut categories: HashMap<String, Uuid> = HashMap::new();
        let mut skipped = Vec::new();

        for row in &rows {
            let category_id = match &row.category {
                None => None,
                Some(name) => match categories.get(name) {
                    Some(id) => Some(*id),
                    None => {
                        let (id, inserted) = category_for_import(&mut *tx, tenant.company_id, name).await?;
                        if inserted {
                            categories_created += 1;
                        }
                        categories.insert(name.clone(), id);
                        Some(id)
                    }
                },
            };

            let inserted = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO products (company_id, name, sku, price, purchase_price, reorder_threshold, category_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (company_id, sku) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(tenant.company_id)
            .bind(&row.name)
            .bind(&row.sku)
            .bind(row.price)
            .bind(row.purchase_price)
            .bind(row.reorder_threshold)
            .bind(category_id)
            .fetch_optional(&mut *tx)
            .await?;

            match inserted {
                Some(_) => created += 1,
                None => skipped.push(ImportRowError {
                    line: row.line,
                    message: format!("SKU '{}' already exists", row.sku.as_deref().unwrap_or_default()),
                }),
            }
        }

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::ProductsImported,
            json!({
                "created": created,
                "categories_created": categories_created,
                "skipped": skipped.len(),
                "errors": errors.len(),
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            company_id = %tenant.company_id,
            created,
            categories_created,
            skipped = skipped.len(),
            errors = errors.len(),
            "Product import complete"
        );

        Ok(ImportReport {
            created,
            categories_created,
            skipped,
            errors,
        })
    }

    // ------------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------------

    pub async fn create_category(&self, tenant: &TenantContext, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (company_id, name)
            VALUES ($1, $2)
            RETURNING id, company_id, name, created_at, 0::BIGINT AS product_count
            "#,
        )
        .bind(tenant.company_id)
        .bind(input.name.trim())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("name".to_string())
            } else {
                e.into()
            }
        })?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::CategoryCreated,
            json!({ "category_id": category.id, "name": category.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    /// Categories with their product counts
    pub async fn list_categories(&self, tenant: &TenantContext) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.company_id = $1 ORDER BY c.name"
        ))
        .bind(tenant.company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }

    pub async fn rename_category(
        &self,
        tenant: &TenantContext,
        category_id: Uuid,
        input: CategoryInput,
    ) -> AppResult<Category> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let old_name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM categories WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(category_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        sqlx::query("UPDATE categories SET name = $2 WHERE id = $1")
            .bind(category_id)
            .bind(input.name.trim())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::DuplicateEntry("name".to_string())
                } else {
                    AppError::from(e)
                }
            })?;

        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1"
        ))
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::CategoryUpdated,
            json!({ "category_id": category_id, "name": { "old": old_name, "new": category.name } }),
        )
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    /// Delete a category no product is filed under
    pub async fn delete_category(&self, tenant: &TenantContext, category_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM categories WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(category_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        let in_use = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(&mut *tx)
            .await?;

        if in_use > 0 {
            return Err(AppError::Conflict {
                resource: "category".to_string(),
                message: format!("Category is assigned to {} products and cannot be deleted", in_use),
                message_fr: format!(
                    "Cette catégorie est attribuée à {} produits et ne peut pas être supprimée",
                    in_use
                ),
            });
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::CategoryDeleted,
            json!({ "category_id": category_id, "name": name }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------------

    pub async fn create_location(&self, tenant: &TenantContext, input: CreateLocationInput) -> AppResult<Location> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let location = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (company_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, company_id, name, description, created_at
            "#,
        )
        .bind(tenant.company_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("name".to_string())
            } else {
                e.into()
            }
        })?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::LocationCreated,
            json!({ "location_id": location.id, "name": location.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(location)
    }

    pub async fn list_locations(&self, tenant: &TenantContext) -> AppResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, company_id, name, description, created_at
            FROM locations
            WHERE company_id = $1
            ORDER BY name
            "#,
        )
        .bind(tenant.company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(locations)
    }

    /// Delete a location holding no stock and named by no purchase order.
    /// Its zero-quantity stock rows go with it.
    pub async fn delete_location(&self, tenant: &TenantContext, location_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM locations WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(location_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Location".to_string()))?;

        let in_use = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM stock WHERE location_id = $1 AND quantity <> 0)
                OR EXISTS(SELECT 1 FROM purchase_orders WHERE receiving_location_id = $1)
            "#,
        )
        .bind(location_id)
        .fetch_one(&mut *tx)
        .await?;

        if in_use {
            return Err(AppError::Conflict {
                resource: "location".to_string(),
                message: "Location still holds stock or is used by a purchase order".to_string(),
                message_fr: "Cet emplacement contient encore du stock ou est utilisé par un bon de commande"
                    .to_string(),
            });
        }

        sqlx::query("DELETE FROM stock WHERE location_id = $1")
            .bind(location_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(location_id)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::LocationDeleted,
            json!({ "location_id": location_id, "name": name }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Clients and suppliers
    // ------------------------------------------------------------------------

    pub async fn create_client(&self, tenant: &TenantContext, input: CreateClientInput) -> AppResult<Client> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (company_id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, name, email, phone, address, created_at
            "#,
        )
        .bind(tenant.company_id)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::ClientCreated,
            json!({ "client_id": client.id, "name": client.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(client)
    }

    pub async fn list_clients(&self, tenant: &TenantContext) -> AppResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, company_id, name, email, phone, address, created_at
            FROM clients
            WHERE company_id = $1
            ORDER BY name
            "#,
        )
        .bind(tenant.company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(clients)
    }

    pub async fn create_supplier(&self, tenant: &TenantContext, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (
                company_id, name, contact_person, email, phone, address,
                payment_terms, lead_time_days, notes, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, company_id, name, contact_person, email, phone, address,
                      payment_terms, lead_time_days, notes, is_active, created_at
            "#,
        )
        .bind(tenant.company_id)
        .bind(input.name.trim())
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.payment_terms)
        .bind(input.lead_time_days.unwrap_or(0))
        .bind(&input.notes)
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::SupplierCreated,
            json!({ "supplier_id": supplier.id, "name": supplier.name }),
        )
        .await?;

        tx.commit().await?;
        Ok(supplier)
    }

    pub async fn list_suppliers(&self, tenant: &TenantContext) -> AppResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT id, company_id, name, contact_person, email, phone, address,
                   payment_terms, lead_time_days, notes, is_active, created_at
            FROM suppliers
            WHERE company_id = $1
            ORDER BY name
            "#,
        )
        .bind(tenant.company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(suppliers)
    }
}
