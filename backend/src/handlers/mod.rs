//! HTTP handlers

pub mod audit;
pub mod catalog;
pub mod health;
pub mod invoice;
pub mod numbering;
pub mod purchasing;
pub mod quote;
pub mod stock;

pub use audit::*;
pub use catalog::*;
pub use health::*;
pub use invoice::*;
pub use numbering::*;
pub use purchasing::*;
pub use quote::*;
pub use stock::*;
