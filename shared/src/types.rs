//! Common types used across the platform

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Who is acting, and on behalf of which tenant.
///
/// Every core operation takes one of these explicitly; nothing reads the
/// tenant from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub company_id: Uuid,
    /// `None` for system actions (e.g. stock reduction triggered by a payment sweep)
    pub actor_id: Option<Uuid>,
}

impl TenantContext {
    pub fn new(company_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            company_id,
            actor_id: Some(actor_id),
        }
    }

    pub fn system(company_id: Uuid) -> Self {
        Self {
            company_id,
            actor_id: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 200;

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE) as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// Raised when a stored or submitted string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Illegal lifecycle moves on quotes, invoices and purchase orders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a {document} in status {from}")]
    Illegal {
        document: &'static str,
        from: &'static str,
        action: &'static str,
    },

    #[error("only accepted quotes can be converted (status {0})")]
    QuoteNotAccepted(&'static str),

    #[error("quote has already been converted to an invoice")]
    AlreadyConverted,

    #[error("{0} can no longer be modified")]
    Locked(&'static str),

    #[error("purchase order has already been fully received")]
    AlreadyReceived,

    #[error("purchase order is cancelled")]
    Cancelled,

    #[error("purchase order has not been fully received")]
    NotYetReceived,

    #[error("stock has already been added for this purchase order")]
    AlreadyAdded,
}
