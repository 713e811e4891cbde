//! Stock ledger service
//!
//! Owns quantity-by-(product, location). Every mutation locks the stock rows
//! it touches with `SELECT ... FOR UPDATE`, writes the new quantities and its
//! audit entries, all on one transaction. The arithmetic itself lives in
//! `shared::models::stock`.
//!
//! `bulk_reduce` and `bulk_increase` run on a caller-supplied connection so
//! the payment, conversion and receiving flows can fold them into their own
//! transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    apply_adjustment, apply_transfer, plan_drain, AuditAction, LedgerError, StockAction, StockHolding,
    TenantContext,
};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::{self, AuditEntry, AuditService};

/// Stock service for ledger operations and stock projections
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Quantity of one product at one location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct StockSnapshot {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i32,
}

/// Stock level row with product and location details
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockLevel {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub location_id: Uuid,
    pub location_name: String,
    pub quantity: i32,
    pub reorder_threshold: i32,
    pub low_stock: bool,
    pub updated_at: DateTime<Utc>,
}

/// Filters for the stock level listing
#[derive(Debug, Default, Deserialize)]
pub struct StockFilter {
    pub location_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// Matches product name or SKU
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
}

/// Input for a manual adjustment
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub action: StockAction,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Input for moving stock between two locations
#[derive(Debug, Deserialize, Validate)]
pub struct TransferStockInput {
    pub product_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Both sides of a completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub source: StockSnapshot,
    pub destination: StockSnapshot,
}

/// Query parameters for stock history
#[derive(Debug, Deserialize)]
pub struct StockHistoryQuery {
    pub product: Uuid,
    pub location: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Document that caused a bulk movement, copied into the audit details
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub kind: &'static str,
    pub id: Uuid,
    pub number: String,
}

/// One product quantity in a bulk movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// What a bulk reduction did for one product
#[derive(Debug, Clone, Serialize)]
pub struct LineReduction {
    pub product_id: Uuid,
    pub requested: i32,
    pub taken: i32,
    pub shortfall: i32,
}

/// Sum quantities per product, ordered by product id.
///
/// Processing products in a fixed order keeps two concurrent bulk
/// movements over the same products from locking rows in opposite orders.
pub fn merge_lines(lines: &[StockLine]) -> Result<Vec<StockLine>, LedgerError> {
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        let total = merged.entry(line.product_id).or_insert(0);
        *total = total.checked_add(line.quantity).ok_or(LedgerError::Overflow)?;
    }
    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| StockLine { product_id, quantity })
        .collect())
}

/// Fail with `InvalidReference` unless every product belongs to the tenant
pub async fn ensure_products(conn: &mut PgConnection, company_id: Uuid, product_ids: &[Uuid]) -> AppResult<()> {
    let mut ids: Vec<Uuid> = product_ids.to_vec();
    ids.sort();
    ids.dedup();

    let found = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE company_id = $1 AND id = ANY($2)",
    )
    .bind(company_id)
    .bind(&ids)
    .fetch_one(&mut *conn)
    .await?;

    if found != ids.len() as i64 {
        return Err(AppError::InvalidReference("Product".to_string()));
    }
    Ok(())
}

/// Fail with `InvalidReference` unless the location belongs to the tenant
pub async fn ensure_location(conn: &mut PgConnection, company_id: Uuid, location_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM locations WHERE id = $1 AND company_id = $2)",
    )
    .bind(location_id)
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::InvalidReference("Location".to_string()));
    }
    Ok(())
}

/// Create the stock row at zero if it does not exist yet
async fn ensure_stock_row(conn: &mut PgConnection, company_id: Uuid, product_id: Uuid, location_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock (company_id, product_id, location_id, quantity)
        VALUES ($1, $2, $3, 0)
        ON CONFLICT (product_id, location_id) DO NOTHING
        "#,
    )
    .bind(company_id)
    .bind(product_id)
    .bind(location_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Lock the row and return its current quantity
async fn lock_quantity(conn: &mut PgConnection, company_id: Uuid, product_id: Uuid, location_id: Uuid) -> AppResult<i32> {
    ensure_stock_row(conn, company_id, product_id, location_id).await?;

    let quantity = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT quantity FROM stock
        WHERE product_id = $1 AND location_id = $2
        FOR UPDATE
        "#,
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(quantity)
}

async fn write_quantity(conn: &mut PgConnection, product_id: Uuid, location_id: Uuid, quantity: i32) -> AppResult<StockSnapshot> {
    let snapshot = sqlx::query_as::<_, StockSnapshot>(
        r#"
        UPDATE stock SET quantity = $3, updated_at = NOW()
        WHERE product_id = $1 AND location_id = $2
        RETURNING product_id, location_id, quantity
        "#,
    )
    .bind(product_id)
    .bind(location_id)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;

    Ok(snapshot)
}

/// Take the lines' quantities off the shelves, fullest location first.
///
/// A product that cannot be fully served is drained to zero everywhere and
/// the gap is recorded as a `STOCK_SHORTFALL` entry; the sale still goes
/// through.
pub async fn bulk_reduce(
    conn: &mut PgConnection,
    tenant: &TenantContext,
    lines: &[StockLine],
    source: &DocumentRef,
) -> AppResult<Vec<LineReduction>> {
    let lines = merge_lines(lines)?;
    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    ensure_products(conn, tenant.company_id, &product_ids).await?;

    let mut report = Vec::with_capacity(lines.len());

    for line in lines {
        let holdings = sqlx::query_as::<_, (Uuid, i32)>(
            r#"
            SELECT location_id, quantity FROM stock
            WHERE company_id = $1 AND product_id = $2 AND quantity > 0
            ORDER BY location_id
            FOR UPDATE
            "#,
        )
        .bind(tenant.company_id)
        .bind(line.product_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|(location_id, quantity)| StockHolding { location_id, quantity })
        .collect::<Vec<_>>();

        let plan = plan_drain(line.quantity, &holdings);

        for draw in &plan.draws {
            write_quantity(conn, line.product_id, draw.location_id, draw.new_quantity).await?;
            audit::record(
                conn,
                tenant,
                AuditAction::StockRemoved,
                json!({
                    "product_id": line.product_id,
                    "location_id": draw.location_id,
                    "quantity": draw.taken,
                    "old_quantity": draw.old_quantity,
                    "new_quantity": draw.new_quantity,
                    "reason": format!("Sale {}", source.number),
                    "source": source,
                }),
            )
            .await?;
        }

        if plan.shortfall > 0 {
            tracing::warn!(
                company_id = %tenant.company_id,
                product_id = %line.product_id,
                requested = line.quantity,
                shortfall = plan.shortfall,
                document = %source.number,
                "Insufficient stock to fully serve sale"
            );
            audit::record(
                conn,
                tenant,
                AuditAction::StockShortfall,
                json!({
                    "product_id": line.product_id,
                    "requested": line.quantity,
                    "fulfilled": plan.total_taken(),
                    "shortfall": plan.shortfall,
                    "source": source,
                }),
            )
            .await?;
        }

        report.push(LineReduction {
            product_id: line.product_id,
            requested: line.quantity,
            taken: plan.total_taken(),
            shortfall: plan.shortfall,
        });
    }

    Ok(report)
}

/// Add the lines' quantities at one location
pub async fn bulk_increase(
    conn: &mut PgConnection,
    tenant: &TenantContext,
    lines: &[StockLine],
    location_id: Uuid,
    source: &DocumentRef,
) -> AppResult<Vec<StockSnapshot>> {
    let lines = merge_lines(lines)?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    ensure_location(conn, tenant.company_id, location_id).await?;
    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    ensure_products(conn, tenant.company_id, &product_ids).await?;

    let mut snapshots = Vec::with_capacity(lines.len());

    for line in lines {
        let current = lock_quantity(conn, tenant.company_id, line.product_id, location_id).await?;
        let new_quantity = apply_adjustment(current, StockAction::Add, line.quantity)?;
        let snapshot = write_quantity(conn, line.product_id, location_id, new_quantity).await?;

        audit::record(
            conn,
            tenant,
            AuditAction::StockAdded,
            json!({
                "product_id": line.product_id,
                "location_id": location_id,
                "quantity": line.quantity,
                "old_quantity": current,
                "new_quantity": new_quantity,
                "reason": format!("Received {}", source.number),
                "source": source,
            }),
        )
        .await?;

        snapshots.push(snapshot);
    }

    Ok(snapshots)
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stock levels for the tenant with low-stock flags
    pub async fn list_levels(&self, tenant: &TenantContext, filter: StockFilter) -> AppResult<Vec<StockLevel>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT s.id, s.product_id, p.name AS product_name, p.sku AS product_sku,
                   s.location_id, l.name AS location_name, s.quantity, p.reorder_threshold,
                   s.quantity <= p.reorder_threshold AS low_stock, s.updated_at
            FROM stock s
            JOIN products p ON p.id = s.product_id
            JOIN locations l ON l.id = s.location_id
            WHERE s.company_id = $1
              AND ($2::UUID IS NULL OR s.location_id = $2)
              AND ($3::TEXT IS NULL OR p.name ILIKE $3 OR p.sku ILIKE $3)
              AND (NOT $4 OR s.quantity <= p.reorder_threshold)
              AND ($5::UUID IS NULL OR p.category_id = $5)
            ORDER BY p.name, l.name
            "#,
        )
        .bind(tenant.company_id)
        .bind(filter.location_id)
        .bind(search)
        .bind(filter.low_stock_only)
        .bind(filter.category_id)
        .fetch_all(&self.db)
        .await?;

        Ok(levels)
    }

    /// Add, remove or set the quantity of one product at one location
    pub async fn adjust(&self, tenant: &TenantContext, input: AdjustStockInput) -> AppResult<StockSnapshot> {
        input.validate()?;
        shared::validate_reason(&input.reason)
            .map_err(|msg| AppError::validation("reason", msg, "Un motif est requis"))?;

        let mut tx = self.db.begin().await?;

        ensure_products(&mut *tx, tenant.company_id, &[input.product_id]).await?;
        ensure_location(&mut *tx, tenant.company_id, input.location_id).await?;

        let current = lock_quantity(&mut *tx, tenant.company_id, input.product_id, input.location_id).await?;
        let new_quantity = apply_adjustment(current, input.action, input.quantity)?;
        let snapshot = write_quantity(&mut *tx, input.product_id, input.location_id, new_quantity).await?;

        audit::record(
            &mut *tx,
            tenant,
            input.action.audit_action(),
            json!({
                "product_id": input.product_id,
                "location_id": input.location_id,
                "action": input.action.as_str(),
                "quantity": input.quantity,
                "old_quantity": current,
                "new_quantity": new_quantity,
                "reason": input.reason.trim(),
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            company_id = %tenant.company_id,
            product_id = %input.product_id,
            location_id = %input.location_id,
            action = input.action.as_str(),
            old_quantity = current,
            new_quantity,
            "Stock adjusted"
        );

        Ok(snapshot)
    }

    /// Move stock between two locations of the tenant
    pub async fn transfer(&self, tenant: &TenantContext, input: TransferStockInput) -> AppResult<TransferResult> {
        if input.from_location_id == input.to_location_id {
            return Err(LedgerError::SameLocation.into());
        }
        input.validate()?;
        shared::validate_reason(&input.reason)
            .map_err(|msg| AppError::validation("reason", msg, "Un motif est requis"))?;

        let mut tx = self.db.begin().await?;

        ensure_products(&mut *tx, tenant.company_id, &[input.product_id]).await?;
        ensure_location(&mut *tx, tenant.company_id, input.from_location_id).await?;
        ensure_location(&mut *tx, tenant.company_id, input.to_location_id).await?;

        ensure_stock_row(&mut *tx, tenant.company_id, input.product_id, input.from_location_id).await?;
        ensure_stock_row(&mut *tx, tenant.company_id, input.product_id, input.to_location_id).await?;

        // Both rows locked in location id order
        let locked = sqlx::query_as::<_, (Uuid, i32)>(
            r#"
            SELECT location_id, quantity FROM stock
            WHERE product_id = $1 AND location_id = ANY($2)
            ORDER BY location_id
            FOR UPDATE
            "#,
        )
        .bind(input.product_id)
        .bind(vec![input.from_location_id, input.to_location_id])
        .fetch_all(&mut *tx)
        .await?;

        let quantity_at = |location: Uuid| {
            locked
                .iter()
                .find(|(id, _)| *id == location)
                .map(|(_, qty)| *qty)
                .ok_or_else(|| AppError::Internal("stock row missing after insert".to_string()))
        };
        let source_before = quantity_at(input.from_location_id)?;
        let destination_before = quantity_at(input.to_location_id)?;

        let (source_after, destination_after) = apply_transfer(source_before, destination_before, input.quantity)?;

        let source = write_quantity(&mut *tx, input.product_id, input.from_location_id, source_after).await?;
        let destination =
            write_quantity(&mut *tx, input.product_id, input.to_location_id, destination_after).await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::StockTransferred,
            json!({
                "product_id": input.product_id,
                "from_location_id": input.from_location_id,
                "to_location_id": input.to_location_id,
                "quantity": input.quantity,
                "from_old_quantity": source_before,
                "from_new_quantity": source_after,
                "to_old_quantity": destination_before,
                "to_new_quantity": destination_after,
                "reason": input.reason.trim(),
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            company_id = %tenant.company_id,
            product_id = %input.product_id,
            from = %input.from_location_id,
            to = %input.to_location_id,
            quantity = input.quantity,
            "Stock transferred"
        );

        Ok(TransferResult { source, destination })
    }

    /// Current quantity, zero when no row exists
    pub async fn quantity(&self, tenant: &TenantContext, product_id: Uuid, location_id: Uuid) -> AppResult<i32> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM stock WHERE company_id = $1 AND product_id = $2 AND location_id = $3",
        )
        .bind(tenant.company_id)
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Stock movements of a product, read from the audit trail
    pub async fn history(&self, tenant: &TenantContext, query: StockHistoryQuery) -> AppResult<Vec<AuditEntry>> {
        let mut conn = self.db.acquire().await?;
        ensure_products(&mut conn, tenant.company_id, &[query.product]).await?;
        if let Some(location_id) = query.location {
            ensure_location(&mut conn, tenant.company_id, location_id).await?;
        }
        drop(conn);

        AuditService::new(self.db.clone())
            .stock_history(tenant, query.product, query.location, query.limit)
            .await
    }
}
