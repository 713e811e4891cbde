//! WebAssembly module for the Stockroom document editors
//!
//! Lets the browser preview what the backend will compute:
//! - Line totals and document totals while a quote or invoice is edited
//! - The status an invoice will take after a payment
//! - Document numbers in their display format
//!
//! Every export is a thin wrapper over a plain function so the arithmetic
//! can be tested off the browser.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("stockroom-wasm ready"));
}

/// One line as the editor holds it; amounts are decimal strings
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewLine {
    pub quantity: i32,
    pub unit_price: String,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: Option<String>,
}

/// Invoice status preview returned to the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPreview {
    pub status: InvoiceStatus,
    pub amount_due: Decimal,
    pub reduces_stock: bool,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| format!("Invalid {}: {}", field, e))
}

fn to_js(err: String) -> JsValue {
    JsValue::from_str(&err)
}

/// Today's date in the browser's local time
fn browser_today() -> Option<NaiveDate> {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
}

pub fn preview_line_total(
    quantity: i32,
    unit_price: &str,
    discount_type: &str,
    discount_value: &str,
) -> Result<Decimal, String> {
    validate_line_quantity(quantity).map_err(str::to_string)?;
    let unit_price = parse_decimal("unit price", unit_price)?;
    validate_money(unit_price).map_err(str::to_string)?;
    let discount_type = DiscountType::from_str(discount_type).map_err(|e| e.to_string())?;
    let discount_value = if discount_value.trim().is_empty() {
        Decimal::ZERO
    } else {
        parse_decimal("discount", discount_value)?
    };
    validate_discount(discount_type, discount_value).map_err(str::to_string)?;

    Ok(line_total(quantity, unit_price, discount_type, discount_value))
}

pub fn preview_document_totals(lines_json: &str, tax_rate: &str, shipping_cost: &str) -> Result<DocumentTotals, String> {
    let lines: Vec<PreviewLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    let tax_rate = parse_decimal("tax rate", tax_rate)?;
    validate_tax_rate(tax_rate).map_err(str::to_string)?;
    let shipping_cost = if shipping_cost.trim().is_empty() {
        Decimal::ZERO
    } else {
        parse_decimal("shipping cost", shipping_cost)?
    };

    let mut totals = Vec::with_capacity(lines.len());
    for line in &lines {
        totals.push(preview_line_total(
            line.quantity,
            &line.unit_price,
            line.discount_type.as_str(),
            line.discount_value.as_deref().unwrap_or(""),
        )?);
    }

    Ok(DocumentTotals::compute(totals, tax_rate, shipping_cost))
}

/// Status after `payment` lands on an invoice, without touching anything
pub fn preview_payment(
    status: &str,
    amount_paid: &str,
    total_amount: &str,
    payment: &str,
    due_date: &str,
    today: NaiveDate,
) -> Result<StatusPreview, String> {
    let status = InvoiceStatus::from_str(status).map_err(|e| e.to_string())?;
    let amount_paid = parse_decimal("amount paid", amount_paid)?;
    let total_amount = parse_decimal("total", total_amount)?;
    let payment = parse_decimal("payment", payment)?;
    let due_date = parse_date("due date", due_date)?;

    check_payment(payment, amount_due(total_amount, amount_paid)).map_err(|e| e.to_string())?;

    let state = InvoiceState {
        status,
        amount_paid: amount_paid + payment,
        total_amount,
        due_date,
        paid_date: None,
        stock_reduced: false,
    };
    let next = transition(&state, today);

    Ok(StatusPreview {
        status: next.status,
        amount_due: amount_due(total_amount, state.amount_paid),
        reduces_stock: next.reduction_due(),
    })
}

/// Line total as a decimal string
#[wasm_bindgen]
pub fn line_total_preview(
    quantity: i32,
    unit_price: &str,
    discount_type: &str,
    discount_value: &str,
) -> Result<String, JsValue> {
    preview_line_total(quantity, unit_price, discount_type, discount_value)
        .map(|total| total.to_string())
        .map_err(to_js)
}

/// Document totals as JSON (`subtotal`, `tax_amount`, `shipping_cost`, `total_amount`)
#[wasm_bindgen]
pub fn document_totals_preview(lines_json: &str, tax_rate: &str, shipping_cost: &str) -> Result<String, JsValue> {
    let totals = preview_document_totals(lines_json, tax_rate, shipping_cost).map_err(to_js)?;
    serde_json::to_string(&totals).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Invoice status after a payment, as JSON. `today` defaults to the browser date.
#[wasm_bindgen]
pub fn payment_preview(
    status: &str,
    amount_paid: &str,
    total_amount: &str,
    payment: &str,
    due_date: &str,
    today: Option<String>,
) -> Result<String, JsValue> {
    let today = match today {
        Some(day) => parse_date("today", &day).map_err(to_js)?,
        None => browser_today().ok_or_else(|| JsValue::from_str("Browser clock unavailable"))?,
    };
    let preview = preview_payment(status, amount_paid, total_amount, payment, due_date, today).map_err(to_js)?;
    serde_json::to_string(&preview).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// `PREFIX-NNNNN` for a series name such as `quote` or `purchase-order`
#[wasm_bindgen]
pub fn format_number(series: &str, value: u32) -> Result<String, JsValue> {
    let series = DocumentSeries::from_str(series).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(format_document_number(series, i64::from(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_line_total_preview() {
        assert_eq!(preview_line_total(4, "12.50", "PERCENTAGE", "10").unwrap(), dec("45.00"));
        assert_eq!(preview_line_total(1, "5.00", "FIXED", "8").unwrap(), Decimal::ZERO);
        assert_eq!(preview_line_total(2, "3.10", "PERCENTAGE", "").unwrap(), dec("6.20"));
    }

    #[test]
    fn test_line_total_rejects_bad_input() {
        assert!(preview_line_total(0, "1.00", "FIXED", "0").is_err());
        assert!(preview_line_total(1, "abc", "FIXED", "0").is_err());
        assert!(preview_line_total(1, "1.00", "BOGUS", "0").is_err());
        assert!(preview_line_total(1, "1.00", "PERCENTAGE", "150").is_err());
    }

    #[test]
    fn test_document_totals_preview() {
        let lines = r#"[
            {"quantity": 2, "unit_price": "100.00"},
            {"quantity": 1, "unit_price": "49.99", "discount_type": "FIXED", "discount_value": "4.99"}
        ]"#;
        let totals = preview_document_totals(lines, "8.25", "").unwrap();
        assert_eq!(totals.subtotal, dec("245.00"));
        assert_eq!(totals.tax_amount, dec("20.21"));
        assert_eq!(totals.total_amount, dec("265.21"));
    }

    #[test]
    fn test_purchase_order_totals_include_shipping() {
        let totals = preview_document_totals(r#"[{"quantity": 10, "unit_price": "6.00"}]"#, "0", "12.50").unwrap();
        assert_eq!(totals.total_amount, dec("72.50"));
    }

    #[test]
    fn test_payment_preview_settles() {
        let preview = preview_payment("UNPAID", "0", "300.00", "300.00", "2026-04-09", day(2026, 3, 10)).unwrap();
        assert_eq!(preview.status, InvoiceStatus::Paid);
        assert_eq!(preview.amount_due, Decimal::ZERO);
        assert!(preview.reduces_stock);
    }

    #[test]
    fn test_payment_preview_partial_overdue() {
        let preview = preview_payment("OVERDUE", "0", "300.00", "50", "2026-01-31", day(2026, 2, 1)).unwrap();
        assert_eq!(preview.status, InvoiceStatus::Overdue);
        assert_eq!(preview.amount_due, dec("250.00"));
        assert!(!preview.reduces_stock);
    }

    #[test]
    fn test_payment_preview_rejects_overpayment() {
        let err = preview_payment("PAID", "300", "300", "0.01", "2026-04-09", day(2026, 3, 10)).unwrap_err();
        assert!(err.contains("exceeds"));
    }
}
