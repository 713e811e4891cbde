//! Line items shared by quotes and invoices
//!
//! Lines snapshot the product name, SKU and unit price when they are
//! written, so later catalog edits never change an issued document.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{line_total, validate_discount, validate_line_quantity, validate_money, DiscountType, DocumentTotals};
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::stock::StockLine;

/// A stored quote or invoice line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[sqlx(try_from = "String")]
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub line_total: Decimal,
    pub position: i32,
}

/// Submitted line; the unit price defaults to the product's current price
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: Decimal,
}

/// Which catalog price a line defaults to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Selling,
    Purchase,
}

/// A line priced and ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub line_total: Decimal,
}

impl PricedLine {
    pub fn new(
        product_id: Uuid,
        product_name: String,
        product_sku: Option<String>,
        quantity: i32,
        unit_price: Decimal,
        discount_type: DiscountType,
        discount_value: Decimal,
    ) -> Self {
        Self {
            product_id,
            product_name,
            product_sku,
            quantity,
            unit_price,
            discount_type,
            discount_value,
            line_total: line_total(quantity, unit_price, discount_type, discount_value),
        }
    }
}

impl From<&LineItem> for PricedLine {
    fn from(line: &LineItem) -> Self {
        PricedLine::new(
            line.product_id,
            line.product_name.clone(),
            line.product_sku.clone(),
            line.quantity,
            line.unit_price,
            line.discount_type,
            line.discount_value,
        )
    }
}

/// Totals of a set of priced lines
pub fn totals_of(lines: &[PricedLine], tax_rate: Decimal, shipping_cost: Decimal) -> DocumentTotals {
    DocumentTotals::compute(lines.iter().map(|l| l.line_total), tax_rate, shipping_cost)
}

/// Product quantities a set of stored lines takes off the shelves
pub fn stock_lines(lines: &[LineItem]) -> Vec<StockLine> {
    lines
        .iter()
        .map(|l| StockLine {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect()
}

/// Field checks run before any transaction is opened
pub fn validate_line_inputs(inputs: &[LineItemInput]) -> AppResult<()> {
    for (index, input) in inputs.iter().enumerate() {
        let field = format!("line_items[{}]", index);
        validate_line_quantity(input.quantity)
            .map_err(|msg| AppError::validation(&field, msg, "Quantité invalide"))?;
        validate_discount(input.discount_type, input.discount_value)
            .map_err(|msg| AppError::validation(&field, msg, "Remise invalide"))?;
        if let Some(price) = input.unit_price {
            validate_money(price).map_err(|msg| AppError::validation(&field, msg, "Prix invalide"))?;
        }
    }
    Ok(())
}

#[derive(FromRow)]
struct ProductPricing {
    id: Uuid,
    name: String,
    sku: Option<String>,
    price: Decimal,
    purchase_price: Decimal,
}

/// Snapshot product details onto the submitted lines.
///
/// Every product must belong to the tenant, otherwise `InvalidReference`.
pub async fn price_lines(
    conn: &mut PgConnection,
    company_id: Uuid,
    inputs: &[LineItemInput],
    source: PriceSource,
) -> AppResult<Vec<PricedLine>> {
    validate_line_inputs(inputs)?;
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = inputs.iter().map(|l| l.product_id).collect();
    let products: HashMap<Uuid, ProductPricing> = sqlx::query_as::<_, ProductPricing>(
        r#"
        SELECT id, name, sku, price, purchase_price
        FROM products
        WHERE company_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(company_id)
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

    inputs
        .iter()
        .map(|input| {
            let product = products
                .get(&input.product_id)
                .ok_or_else(|| AppError::InvalidReference("Product".to_string()))?;
            let default_price = match source {
                PriceSource::Selling => product.price,
                PriceSource::Purchase => product.purchase_price,
            };
            Ok(PricedLine::new(
                product.id,
                product.name.clone(),
                product.sku.clone(),
                input.quantity,
                input.unit_price.unwrap_or(default_price),
                input.discount_type,
                input.discount_value,
            ))
        })
        .collect()
}

/// Tables holding sales document lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesLines {
    Quote,
    Invoice,
}

impl SalesLines {
    fn table(&self) -> (&'static str, &'static str) {
        match self {
            SalesLines::Quote => ("quote_line_items", "quote_id"),
            SalesLines::Invoice => ("invoice_line_items", "invoice_id"),
        }
    }
}

/// Replace every line of a document
pub async fn replace_lines(
    conn: &mut PgConnection,
    kind: SalesLines,
    parent_id: Uuid,
    lines: &[PricedLine],
) -> AppResult<Vec<LineItem>> {
    let (table, parent) = kind.table();

    sqlx::query(&format!("DELETE FROM {table} WHERE {parent} = $1"))
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;

    let mut stored = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let item = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            INSERT INTO {table} (
                {parent}, product_id, product_name, product_sku, quantity, unit_price,
                discount_type, discount_value, line_total, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, product_id, product_name, product_sku, quantity, unit_price,
                      discount_type, discount_value, line_total, position
            "#
        ))
        .bind(parent_id)
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

/// Lines of a document in entry order
pub async fn fetch_lines(conn: &mut PgConnection, kind: SalesLines, parent_id: Uuid) -> AppResult<Vec<LineItem>> {
    let (table, parent) = kind.table();

    let lines = sqlx::query_as::<_, LineItem>(&format!(
        r#"
        SELECT id, product_id, product_name, product_sku, quantity, unit_price,
               discount_type, discount_value, line_total, position
        FROM {table}
        WHERE {parent} = $1
        ORDER BY position, id
        "#
    ))
    .bind(parent_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Company defaults used for new sales documents
#[derive(Debug, Clone, FromRow)]
pub struct CompanyDefaults {
    pub sales_tax_rate: Decimal,
    pub payment_terms: Option<String>,
}

pub async fn company_defaults(conn: &mut PgConnection, company_id: Uuid) -> AppResult<CompanyDefaults> {
    sqlx::query_as::<_, CompanyDefaults>("SELECT sales_tax_rate, payment_terms FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::InvalidReference("Company".to_string()))
}

/// Fail with `InvalidReference` unless the client belongs to the tenant
pub async fn ensure_client(conn: &mut PgConnection, company_id: Uuid, client_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1 AND company_id = $2)",
    )
    .bind(client_id)
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::InvalidReference("Client".to_string()));
    }
    Ok(())
}
