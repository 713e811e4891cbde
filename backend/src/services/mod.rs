//! Business logic services for the Stockroom back-office

pub mod audit;
pub mod catalog;
pub mod invoice;
pub mod line_items;
pub mod numbering;
pub mod payment;
pub mod purchasing;
pub mod quote;
pub mod stock;

pub use audit::AuditService;
pub use catalog::CatalogService;
pub use invoice::InvoiceService;
pub use numbering::{NumberingService, RetryPolicy};
pub use payment::PaymentService;
pub use purchasing::PurchasingService;
pub use quote::QuoteService;
pub use stock::StockService;
