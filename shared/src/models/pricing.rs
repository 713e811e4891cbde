//! Line and document totals for quotes, invoices and purchase orders

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::types::ParseEnumError;

/// How a line discount is expressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Percentage of `quantity × unit_price`
    #[default]
    Percentage,
    /// Flat amount off the line
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::Fixed => "FIXED",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(DiscountType::Percentage),
            "FIXED" => Ok(DiscountType::Fixed),
            other => Err(ParseEnumError::new("discount type", other)),
        }
    }
}

impl TryFrom<String> for DiscountType {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Round to cents, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity × unit_price − discount`, never below zero
pub fn line_total(quantity: i32, unit_price: Decimal, discount_type: DiscountType, discount_value: Decimal) -> Decimal {
    let base = Decimal::from(quantity) * unit_price;
    let discount = match discount_type {
        DiscountType::Percentage => base * discount_value / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => discount_value,
    };
    round_money((base - discount).max(Decimal::ZERO))
}

/// Subtotal, tax and grand total of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    /// Zero for sales documents
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
}

impl DocumentTotals {
    /// Sum the line totals and apply a flat `tax_rate` percentage.
    ///
    /// `total = subtotal + tax + shipping`; tax is rounded to cents before
    /// it is added.
    pub fn compute<I>(line_totals: I, tax_rate: Decimal, shipping_cost: Decimal) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let subtotal = round_money(line_totals.into_iter().sum());
        let tax_amount = round_money(subtotal * tax_rate / Decimal::ONE_HUNDRED);
        let shipping_cost = round_money(shipping_cost);
        Self {
            subtotal,
            tax_amount,
            shipping_cost,
            total_amount: subtotal + tax_amount + shipping_cost,
        }
    }

    pub fn zero() -> Self {
        Self::compute(std::iter::empty(), Decimal::ZERO, Decimal::ZERO)
    }
}
