//! Domain models for the Stockroom back-office

mod audit;
mod invoice;
mod numbering;
mod pricing;
mod purchasing;
mod quote;
mod stock;

pub use audit::*;
pub use invoice::*;
pub use numbering::*;
pub use pricing::*;
pub use purchasing::*;
pub use quote::*;
pub use stock::*;
