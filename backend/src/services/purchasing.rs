//! Purchase order service and receiving
//!
//! Receiving records what arrived; shelving it is a separate explicit step
//! (`add_stock_to_inventory`) guarded by the `stock_added` flag.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    derive_receipt_status, line_total, validate_money, validate_tax_rate, AuditAction, DiscountType, DocumentSeries,
    DocumentTotals, PurchaseOrderAction, PurchaseOrderStatus, ReceiptLine, TenantContext, TransitionError,
};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::line_items::{self, price_lines, LineItemInput, PriceSource, PricedLine};
use crate::services::numbering::{issue_number, with_number_retry, RetryPolicy};
use crate::services::stock::{bulk_increase, ensure_location, DocumentRef, StockLine, StockSnapshot};

/// Purchasing service
#[derive(Clone)]
pub struct PurchasingService {
    db: PgPool,
    retry: RetryPolicy,
}

/// Purchase order header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub company_id: Uuid,
    pub po_number: String,
    pub supplier_id: Uuid,
    pub receiving_location_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub shipping_cost: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub stock_added: bool,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase order line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity_ordered: i32,
    pub quantity_received: i32,
    pub unit_price: Decimal,
    #[sqlx(try_from = "String")]
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub line_total: Decimal,
    pub position: i32,
}

impl PurchaseOrderLine {
    fn receipt(&self) -> ReceiptLine {
        ReceiptLine {
            quantity_ordered: self.quantity_ordered,
            quantity_received: self.quantity_received,
        }
    }
}

/// Purchase order with its lines
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub purchase_order: PurchaseOrder,
    pub line_items: Vec<PurchaseOrderLine>,
}

/// Input for creating a purchase order; line prices default to the
/// product's purchase price
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: Uuid,
    pub receiving_location_id: Uuid,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

/// Input for updating a purchase order; `line_items` replaces every line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchaseOrderInput {
    pub supplier_id: Option<Uuid>,
    pub receiving_location_id: Option<Uuid>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

/// One line of a receipt
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReceiptInput {
    pub line_item_id: Uuid,
    pub quantity_received: i32,
}

/// Input for receiving goods
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveItemsInput {
    pub items: Vec<ReceiptInput>,
}

/// Result of shelving a received order
#[derive(Debug, Clone, Serialize)]
pub struct StockAddition {
    pub purchase_order: PurchaseOrder,
    pub stock: Vec<StockSnapshot>,
}

/// Filters for listing purchase orders
#[derive(Debug, Default, Deserialize)]
pub struct PurchaseOrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<Uuid>,
}

const PO_COLUMNS: &str = r#"
    id, company_id, po_number, supplier_id, receiving_location_id, status, order_date,
    expected_delivery_date, received_date, tax_rate, shipping_cost, subtotal, tax_amount,
    total_amount, stock_added, notes, terms, created_by, created_at, updated_at
"#;

const PO_LINE_COLUMNS: &str = r#"
    id, product_id, product_name, product_sku, quantity_ordered, quantity_received,
    unit_price, discount_type, discount_value, line_total, position
"#;

fn check_charges(tax_rate: Decimal, shipping_cost: Decimal) -> AppResult<()> {
    validate_tax_rate(tax_rate).map_err(|msg| AppError::validation("tax_rate", msg, "Taux de taxe invalide"))?;
    validate_money(shipping_cost)
        .map_err(|msg| AppError::validation("shipping_cost", msg, "Frais de port invalides"))
}

/// Field checks on a receipt before anything is locked
pub fn validate_receipt(items: &[ReceiptInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::validation(
            "items",
            "At least one line must be received",
            "Au moins une ligne doit être reçue",
        ));
    }
    if let Some(index) = items.iter().position(|i| i.quantity_received < 0) {
        return Err(AppError::validation(
            &format!("items[{}]", index),
            "Received quantity cannot be negative",
            "La quantité reçue ne peut pas être négative",
        ));
    }
    Ok(())
}

fn po_totals(lines: &[PurchaseOrderLine], tax_rate: Decimal, shipping_cost: Decimal) -> DocumentTotals {
    DocumentTotals::compute(
        lines
            .iter()
            .map(|l| line_total(l.quantity_ordered, l.unit_price, l.discount_type, l.discount_value)),
        tax_rate,
        shipping_cost,
    )
}

async fn ensure_supplier(conn: &mut PgConnection, company_id: Uuid, supplier_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1 AND company_id = $2)",
    )
    .bind(supplier_id)
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::InvalidReference("Supplier".to_string()));
    }
    Ok(())
}

async fn lock_purchase_order(conn: &mut PgConnection, company_id: Uuid, po_id: Uuid) -> AppResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrder>(&format!(
        "SELECT {PO_COLUMNS} FROM purchase_orders WHERE id = $1 AND company_id = $2 FOR UPDATE"
    ))
    .bind(po_id)
    .bind(company_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))
}

async fn fetch_po_lines(conn: &mut PgConnection, po_id: Uuid) -> AppResult<Vec<PurchaseOrderLine>> {
    let lines = sqlx::query_as::<_, PurchaseOrderLine>(&format!(
        "SELECT {PO_LINE_COLUMNS} FROM purchase_order_line_items WHERE purchase_order_id = $1 ORDER BY position, id"
    ))
    .bind(po_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

async fn replace_po_lines(conn: &mut PgConnection, po_id: Uuid, lines: &[PricedLine]) -> AppResult<Vec<PurchaseOrderLine>> {
    sqlx::query("DELETE FROM purchase_order_line_items WHERE purchase_order_id = $1")
        .bind(po_id)
        .execute(&mut *conn)
        .await?;

    let mut stored = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let item = sqlx::query_as::<_, PurchaseOrderLine>(&format!(
            r#"
            INSERT INTO purchase_order_line_items (
                purchase_order_id, product_id, product_name, product_sku, quantity_ordered,
                unit_price, discount_type, discount_value, line_total, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PO_LINE_COLUMNS}
            "#
        ))
        .bind(po_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.product_sku)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.discount_type.as_str())
        .bind(line.discount_value)
        .bind(line.line_total)
        .bind(position as i32)
        .fetch_one(&mut *conn)
        .await?;
        stored.push(item);
    }

    Ok(stored)
}

impl PurchasingService {
    /// Create a new PurchasingService instance
    pub fn new(db: PgPool, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Create a DRAFT purchase order with a fresh PO number
    pub async fn create_purchase_order(
        &self,
        tenant: &TenantContext,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        check_charges(input.tax_rate, input.shipping_cost)?;
        line_items::validate_line_inputs(&input.line_items)?;

        let detail =
            with_number_retry(&self.retry, DocumentSeries::PurchaseOrder, || self.create_once(tenant, &input)).await?;

        tracing::info!(
            company_id = %tenant.company_id,
            po_number = %detail.purchase_order.po_number,
            "Purchase order created"
        );

        Ok(detail)
    }

    async fn create_once(&self, tenant: &TenantContext, input: &CreatePurchaseOrderInput) -> AppResult<PurchaseOrderDetail> {
        let mut tx = self.db.begin().await?;

        ensure_supplier(&mut *tx, tenant.company_id, input.supplier_id).await?;
        ensure_location(&mut *tx, tenant.company_id, input.receiving_location_id).await?;
        let priced = price_lines(&mut *tx, tenant.company_id, &input.line_items, PriceSource::Purchase).await?;
        let totals = DocumentTotals::compute(priced.iter().map(|l| l.line_total), input.tax_rate, input.shipping_cost);

        let number = issue_number(&mut *tx, tenant.company_id, DocumentSeries::PurchaseOrder).await?;

        let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            INSERT INTO purchase_orders (
                company_id, po_number, supplier_id, receiving_location_id, status, order_date,
                expected_delivery_date, tax_rate, shipping_cost, subtotal, tax_amount, total_amount,
                notes, terms, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {PO_COLUMNS}
            "#
        ))
        .bind(tenant.company_id)
        .bind(&number)
        .bind(input.supplier_id)
        .bind(input.receiving_location_id)
        .bind(PurchaseOrderStatus::Draft.as_str())
        .bind(input.order_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(input.expected_delivery_date)
        .bind(input.tax_rate)
        .bind(input.shipping_cost)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .bind(&input.terms)
        .bind(tenant.actor_id)
        .fetch_one(&mut *tx)
        .await?;

        let line_items = replace_po_lines(&mut *tx, purchase_order.id, &priced).await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::PurchaseOrderCreated,
            json!({
                "purchase_order_id": purchase_order.id,
                "po_number": purchase_order.po_number,
                "supplier_id": purchase_order.supplier_id,
                "total_amount": purchase_order.total_amount,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(PurchaseOrderDetail {
            purchase_order,
            line_items,
        })
    }

    /// Get a purchase order with its lines
    pub async fn get_purchase_order(&self, tenant: &TenantContext, po_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        let mut conn = self.db.acquire().await?;

        let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE id = $1 AND company_id = $2"
        ))
        .bind(po_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let line_items = fetch_po_lines(&mut *conn, po_id).await?;
        Ok(PurchaseOrderDetail {
            purchase_order,
            line_items,
        })
    }

    /// List purchase order headers, newest first
    pub async fn list_purchase_orders(
        &self,
        tenant: &TenantContext,
        filter: PurchaseOrderFilter,
    ) -> AppResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            SELECT {PO_COLUMNS} FROM purchase_orders
            WHERE company_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::UUID IS NULL OR supplier_id = $3)
            ORDER BY created_at DESC, po_number DESC
            "#
        ))
        .bind(tenant.company_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.supplier_id)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }

    /// Edit an order that is still DRAFT, SENT or CONFIRMED
    pub async fn update_purchase_order(
        &self,
        tenant: &TenantContext,
        po_id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        let mut tx = self.db.begin().await?;

        let current = lock_purchase_order(&mut *tx, tenant.company_id, po_id).await?;
        if !current.status.is_editable() {
            return Err(TransitionError::Locked("purchase order").into());
        }

        let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
        let shipping_cost = input.shipping_cost.unwrap_or(current.shipping_cost);
        check_charges(tax_rate, shipping_cost)?;

        if let Some(supplier_id) = input.supplier_id {
            ensure_supplier(&mut *tx, tenant.company_id, supplier_id).await?;
        }
        if let Some(location_id) = input.receiving_location_id {
            ensure_location(&mut *tx, tenant.company_id, location_id).await?;
        }

        let line_items = match &input.line_items {
            Some(inputs) => {
                let priced = price_lines(&mut *tx, tenant.company_id, inputs, PriceSource::Purchase).await?;
                replace_po_lines(&mut *tx, po_id, &priced).await?
            }
            None => fetch_po_lines(&mut *tx, po_id).await?,
        };
        let totals = po_totals(&line_items, tax_rate, shipping_cost);

        let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_orders SET
                supplier_id = COALESCE($3, supplier_id),
                receiving_location_id = COALESCE($4, receiving_location_id),
                expected_delivery_date = COALESCE($5, expected_delivery_date),
                tax_rate = $6,
                shipping_cost = $7,
                subtotal = $8,
                tax_amount = $9,
                total_amount = $10,
                notes = COALESCE($11, notes),
                terms = COALESCE($12, terms),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {PO_COLUMNS}
            "#
        ))
        .bind(po_id)
        .bind(tenant.company_id)
        .bind(input.supplier_id)
        .bind(input.receiving_location_id)
        .bind(input.expected_delivery_date)
        .bind(tax_rate)
        .bind(shipping_cost)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .bind(&input.terms)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::PurchaseOrderUpdated,
            json!({
                "purchase_order_id": purchase_order.id,
                "po_number": purchase_order.po_number,
                "lines_replaced": input.line_items.is_some(),
                "total_amount": { "old": current.total_amount, "new": purchase_order.total_amount },
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(PurchaseOrderDetail {
            purchase_order,
            line_items,
        })
    }

    /// DRAFT → SENT
    pub async fn send_purchase_order(&self, tenant: &TenantContext, po_id: Uuid) -> AppResult<PurchaseOrder> {
        self.change_status(tenant, po_id, |order, _| order.status.apply(PurchaseOrderAction::Send), "send")
            .await
    }

    /// SENT → CONFIRMED
    pub async fn confirm_purchase_order(&self, tenant: &TenantContext, po_id: Uuid) -> AppResult<PurchaseOrder> {
        self.change_status(tenant, po_id, |order, _| order.status.apply(PurchaseOrderAction::Confirm), "confirm")
            .await
    }

    /// Cancel an order nothing has been received or shelved for
    pub async fn cancel_purchase_order(&self, tenant: &TenantContext, po_id: Uuid) -> AppResult<PurchaseOrder> {
        self.change_status(
            tenant,
            po_id,
            |order, lines| {
                order.status.check_cancellable(order.stock_added)?;
                if lines.iter().any(|l| l.quantity_received > 0) {
                    return Err(TransitionError::Illegal {
                        document: "purchase order",
                        from: order.status.as_str(),
                        action: "cancel",
                    });
                }
                Ok(PurchaseOrderStatus::Cancelled)
            },
            "cancel",
        )
        .await
    }

    async fn change_status<F>(&self, tenant: &TenantContext, po_id: Uuid, next: F, action: &str) -> AppResult<PurchaseOrder>
    where
        F: FnOnce(&PurchaseOrder, &[PurchaseOrderLine]) -> Result<PurchaseOrderStatus, TransitionError>,
    {
        let mut tx = self.db.begin().await?;

        let current = lock_purchase_order(&mut *tx, tenant.company_id, po_id).await?;
        let lines = fetch_po_lines(&mut *tx, po_id).await?;
        let status = next(&current, &lines)?;

        let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_orders SET status = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {PO_COLUMNS}
            "#
        ))
        .bind(po_id)
        .bind(tenant.company_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::PurchaseOrderStatusChanged,
            json!({
                "purchase_order_id": purchase_order.id,
                "po_number": purchase_order.po_number,
                "action": action,
                "old_status": current.status.as_str(),
                "new_status": status.as_str(),
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            po_number = %purchase_order.po_number,
            from = current.status.as_str(),
            to = status.as_str(),
            "Purchase order status changed"
        );

        Ok(purchase_order)
    }

    /// Record received quantities. Each listed line's quantity is
    /// overwritten, then the order's status is derived from all lines.
    pub async fn receive_line_items(
        &self,
        tenant: &TenantContext,
        po_id: Uuid,
        input: ReceiveItemsInput,
    ) -> AppResult<PurchaseOrderDetail> {
        validate_receipt(&input.items)?;

        let mut tx = self.db.begin().await?;

        let current = lock_purchase_order(&mut *tx, tenant.company_id, po_id).await?;
        current.status.check_receivable()?;

        let known: HashMap<Uuid, i32> = fetch_po_lines(&mut *tx, po_id)
            .await?
            .into_iter()
            .map(|l| (l.id, l.quantity_received))
            .collect();

        let mut changes = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let previous = known
                .get(&item.line_item_id)
                .copied()
                .ok_or_else(|| AppError::InvalidReference("Purchase order line".to_string()))?;

            sqlx::query("UPDATE purchase_order_line_items SET quantity_received = $2 WHERE id = $1")
                .bind(item.line_item_id)
                .bind(item.quantity_received)
                .execute(&mut *tx)
                .await?;

            changes.push(json!({
                "line_item_id": item.line_item_id,
                "old_quantity_received": previous,
                "new_quantity_received": item.quantity_received,
            }));
        }

        let line_items = fetch_po_lines(&mut *tx, po_id).await?;
        let receipts: Vec<ReceiptLine> = line_items.iter().map(PurchaseOrderLine::receipt).collect();
        let status = derive_receipt_status(current.status, &receipts);
        let received_date = match status {
            PurchaseOrderStatus::Received => Some(Utc::now().date_naive()),
            _ => current.received_date,
        };

        let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_orders SET status = $3, received_date = $4, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {PO_COLUMNS}
            "#
        ))
        .bind(po_id)
        .bind(tenant.company_id)
        .bind(status.as_str())
        .bind(received_date)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::PurchaseOrderReceived,
            json!({
                "purchase_order_id": purchase_order.id,
                "po_number": purchase_order.po_number,
                "items": changes,
                "old_status": current.status.as_str(),
                "new_status": status.as_str(),
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            po_number = %purchase_order.po_number,
            status = status.as_str(),
            lines = input.items.len(),
            "Purchase order receipt recorded"
        );

        Ok(PurchaseOrderDetail {
            purchase_order,
            line_items,
        })
    }

    /// Shelve every received quantity at the receiving location, once
    pub async fn add_stock_to_inventory(&self, tenant: &TenantContext, po_id: Uuid) -> AppResult<StockAddition> {
        let mut tx = self.db.begin().await?;

        let current = lock_purchase_order(&mut *tx, tenant.company_id, po_id).await?;
        current.status.check_stock_addable(current.stock_added)?;

        let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_orders SET stock_added = TRUE, updated_at = NOW()
            WHERE id = $1 AND company_id = $2 AND NOT stock_added
            RETURNING {PO_COLUMNS}
            "#
        ))
        .bind(po_id)
        .bind(tenant.company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::AlreadyAdded)?;

        let lines: Vec<StockLine> = fetch_po_lines(&mut *tx, po_id)
            .await?
            .iter()
            .filter(|l| l.quantity_received > 0)
            .map(|l| StockLine {
                product_id: l.product_id,
                quantity: l.quantity_received,
            })
            .collect();

        let source = DocumentRef {
            kind: "purchase_order",
            id: purchase_order.id,
            number: purchase_order.po_number.clone(),
        };
        let stock = bulk_increase(&mut *tx, tenant, &lines, purchase_order.receiving_location_id, &source).await?;

        audit::record(
            &mut *tx,
            tenant,
            AuditAction::PurchaseOrderStockAdded,
            json!({
                "purchase_order_id": purchase_order.id,
                "po_number": purchase_order.po_number,
                "location_id": purchase_order.receiving_location_id,
                "lines": lines,
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            po_number = %purchase_order.po_number,
            products = stock.len(),
            "Received goods added to stock"
        );

        Ok(StockAddition { purchase_order, stock })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn po_line(ordered: i32, price: &str) -> PurchaseOrderLine {
        PurchaseOrderLine {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Beans".to_string(),
            product_sku: None,
            quantity_ordered: ordered,
            quantity_received: 0,
            unit_price: dec(price),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::ZERO,
            line_total: Decimal::ZERO,
            position: 0,
        }
    }

    #[test]
    fn test_receipt_validation() {
        assert!(validate_receipt(&[]).is_err());

        let negative = ReceiptInput {
            line_item_id: Uuid::new_v4(),
            quantity_received: -1,
        };
        assert!(validate_receipt(&[negative]).is_err());

        let ok = ReceiptInput {
            line_item_id: Uuid::new_v4(),
            quantity_received: 0,
        };
        assert!(validate_receipt(&[ok]).is_ok());
    }

    #[test]
    fn test_po_totals_include_shipping() {
        let lines = vec![po_line(10, "4.00"), po_line(5, "2.00")];
        let totals = po_totals(&lines, dec("10"), dec("15.00"));
        assert_eq!(totals.subtotal, dec("50.00"));
        assert_eq!(totals.tax_amount, dec("5.00"));
        assert_eq!(totals.total_amount, dec("70.00"));
    }

    #[test]
    fn test_charges_validation() {
        assert!(check_charges(dec("7.5"), dec("0")).is_ok());
        assert!(check_charges(dec("7.5"), dec("-1")).is_err());
    }
}
