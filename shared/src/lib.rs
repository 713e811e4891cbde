//! Shared types and domain rules for the Stockroom back-office
//!
//! This crate holds everything that can be decided without touching the
//! database: status machines, document totals, document numbering, stock
//! drain planning and input validation. It is used by the backend, and by the
//! browser (via WASM) for live previews in the document editors.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
