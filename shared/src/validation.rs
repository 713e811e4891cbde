//! Validation utilities for the Stockroom back-office
//!
//! Checks that run before any database transaction is opened.

use rust_decimal::Decimal;

use crate::models::DiscountType;

// ============================================================================
// Document Validations
// ============================================================================

/// Tax rate is a flat percentage between 0 and 100
pub fn validate_tax_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err("Tax rate must be between 0 and 100");
    }
    Ok(())
}

/// Percentage discounts stay within 0..=100; fixed discounts are non-negative
pub fn validate_discount(discount_type: DiscountType, value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Discount cannot be negative");
    }
    if discount_type == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err("Percentage discount cannot exceed 100");
    }
    Ok(())
}

/// Largest quantity a single document line may carry
pub const MAX_LINE_QUANTITY: i32 = 1_000_000;

/// Line quantities are at least one unit and at most [`MAX_LINE_QUANTITY`]
pub fn validate_line_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity < 1 {
        return Err("Line quantity must be at least 1");
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err("Line quantity cannot exceed 1,000,000");
    }
    Ok(())
}

/// Prices, shipping costs and payments are non-negative with at most two decimals
pub fn validate_money(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount cannot have more than two decimal places");
    }
    Ok(())
}

// ============================================================================
// Stock Validations
// ============================================================================

/// Adjustment quantities are non-negative
pub fn validate_stock_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Every manual stock movement carries a reason
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err("A reason is required");
    }
    if trimmed.chars().count() > 500 {
        return Err("Reason must be at most 500 characters");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.ends_with('.') => Ok(()),
        _ => Err("Invalid email format"),
    }
}

/// SKU: 1-100 characters, letters, digits, dash, underscore or dot
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.is_empty() || sku.len() > 100 {
        return Err("SKU must be 1-100 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("SKU may contain letters, digits, '-', '_' and '.' only");
    }
    Ok(())
}
