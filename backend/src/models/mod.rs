//! Domain models
//!
//! Status machines, totals and numbering rules live in the shared crate so
//! the WASM previews run the same code as the server.

pub use shared::models::*;
