//! Audit trail action kinds

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::types::ParseEnumError;

/// Every kind of mutation that leaves an entry in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // Stock ledger
    StockAdded,
    StockRemoved,
    StockSet,
    StockTransferred,
    /// A sale could not be fully served from stock
    StockShortfall,

    // Catalog
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    ProductsImported,
    CategoryCreated,
    CategoryUpdated,
    CategoryDeleted,
    LocationCreated,
    LocationDeleted,
    ClientCreated,
    SupplierCreated,

    // Numbering
    DocumentNumberIssued,

    // Quotes
    QuoteCreated,
    QuoteUpdated,
    QuoteStatusChanged,
    QuoteConverted,

    // Invoices and payments
    InvoiceCreated,
    InvoiceUpdated,
    InvoiceStatusChanged,
    PaymentRecorded,

    // Purchasing
    PurchaseOrderCreated,
    PurchaseOrderUpdated,
    PurchaseOrderStatusChanged,
    PurchaseOrderReceived,
    PurchaseOrderStockAdded,
}

impl AuditAction {
    /// Kinds that describe a stock movement, shown in stock history
    pub const STOCK_MOVEMENTS: [AuditAction; 5] = [
        AuditAction::StockAdded,
        AuditAction::StockRemoved,
        AuditAction::StockSet,
        AuditAction::StockTransferred,
        AuditAction::StockShortfall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StockAdded => "STOCK_ADDED",
            AuditAction::StockRemoved => "STOCK_REMOVED",
            AuditAction::StockSet => "STOCK_SET",
            AuditAction::StockTransferred => "STOCK_TRANSFERRED",
            AuditAction::StockShortfall => "STOCK_SHORTFALL",
            AuditAction::ProductCreated => "PRODUCT_CREATED",
            AuditAction::ProductUpdated => "PRODUCT_UPDATED",
            AuditAction::ProductDeleted => "PRODUCT_DELETED",
            AuditAction::ProductsImported => "PRODUCTS_IMPORTED",
            AuditAction::CategoryCreated => "CATEGORY_CREATED",
            AuditAction::CategoryUpdated => "CATEGORY_UPDATED",
            AuditAction::CategoryDeleted => "CATEGORY_DELETED",
            AuditAction::LocationCreated => "LOCATION_CREATED",
            AuditAction::LocationDeleted => "LOCATION_DELETED",
            AuditAction::ClientCreated => "CLIENT_CREATED",
            AuditAction::SupplierCreated => "SUPPLIER_CREATED",
            AuditAction::DocumentNumberIssued => "DOCUMENT_NUMBER_ISSUED",
            AuditAction::QuoteCreated => "QUOTE_CREATED",
            AuditAction::QuoteUpdated => "QUOTE_UPDATED",
            AuditAction::QuoteStatusChanged => "QUOTE_STATUS_CHANGED",
            AuditAction::QuoteConverted => "QUOTE_CONVERTED",
            AuditAction::InvoiceCreated => "INVOICE_CREATED",
            AuditAction::InvoiceUpdated => "INVOICE_UPDATED",
            AuditAction::InvoiceStatusChanged => "INVOICE_STATUS_CHANGED",
            AuditAction::PaymentRecorded => "PAYMENT_RECORDED",
            AuditAction::PurchaseOrderCreated => "PURCHASE_ORDER_CREATED",
            AuditAction::PurchaseOrderUpdated => "PURCHASE_ORDER_UPDATED",
            AuditAction::PurchaseOrderStatusChanged => "PURCHASE_ORDER_STATUS_CHANGED",
            AuditAction::PurchaseOrderReceived => "PURCHASE_ORDER_RECEIVED",
            AuditAction::PurchaseOrderStockAdded => "PURCHASE_ORDER_STOCK_ADDED",
        }
    }

    pub fn is_stock_movement(&self) -> bool {
        Self::STOCK_MOVEMENTS.contains(self)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "STOCK_ADDED" => AuditAction::StockAdded,
            "STOCK_REMOVED" => AuditAction::StockRemoved,
            "STOCK_SET" => AuditAction::StockSet,
            "STOCK_TRANSFERRED" => AuditAction::StockTransferred,
            "STOCK_SHORTFALL" => AuditAction::StockShortfall,
            "PRODUCT_CREATED" => AuditAction::ProductCreated,
            "PRODUCT_UPDATED" => AuditAction::ProductUpdated,
            "PRODUCT_DELETED" => AuditAction::ProductDeleted,
            "PRODUCTS_IMPORTED" => AuditAction::ProductsImported,
            "CATEGORY_CREATED" => AuditAction::CategoryCreated,
            "CATEGORY_UPDATED" => AuditAction::CategoryUpdated,
            "CATEGORY_DELETED" => AuditAction::CategoryDeleted,
            "LOCATION_CREATED" => AuditAction::LocationCreated,
            "LOCATION_DELETED" => AuditAction::LocationDeleted,
            "CLIENT_CREATED" => AuditAction::ClientCreated,
            "SUPPLIER_CREATED" => AuditAction::SupplierCreated,
            "DOCUMENT_NUMBER_ISSUED" => AuditAction::DocumentNumberIssued,
            "QUOTE_CREATED" => AuditAction::QuoteCreated,
            "QUOTE_UPDATED" => AuditAction::QuoteUpdated,
            "QUOTE_STATUS_CHANGED" => AuditAction::QuoteStatusChanged,
            "QUOTE_CONVERTED" => AuditAction::QuoteConverted,
            "INVOICE_CREATED" => AuditAction::InvoiceCreated,
            "INVOICE_UPDATED" => AuditAction::InvoiceUpdated,
            "INVOICE_STATUS_CHANGED" => AuditAction::InvoiceStatusChanged,
            "PAYMENT_RECORDED" => AuditAction::PaymentRecorded,
            "PURCHASE_ORDER_CREATED" => AuditAction::PurchaseOrderCreated,
            "PURCHASE_ORDER_UPDATED" => AuditAction::PurchaseOrderUpdated,
            "PURCHASE_ORDER_STATUS_CHANGED" => AuditAction::PurchaseOrderStatusChanged,
            "PURCHASE_ORDER_RECEIVED" => AuditAction::PurchaseOrderReceived,
            "PURCHASE_ORDER_STOCK_ADDED" => AuditAction::PurchaseOrderStockAdded,
            other => return Err(ParseEnumError::new("audit action", other)),
        };
        Ok(action)
    }
}

impl TryFrom<String> for AuditAction {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_names_parse_back() {
        for action in [
            AuditAction::StockShortfall,
            AuditAction::CategoryDeleted,
            AuditAction::PaymentRecorded,
            AuditAction::PurchaseOrderStockAdded,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
    }

    #[test]
    fn test_serde_matches_stored_name() {
        let json = serde_json::to_string(&AuditAction::StockTransferred).unwrap();
        assert_eq!(json, "\"STOCK_TRANSFERRED\"");
    }

    #[test]
    fn test_stock_movements() {
        assert!(AuditAction::StockSet.is_stock_movement());
        assert!(!AuditAction::PaymentRecorded.is_stock_movement());
    }
}
