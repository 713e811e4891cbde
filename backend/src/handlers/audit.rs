//! HTTP handlers for the audit trail

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::audit::{AuditEntry, AuditFilter, AuditService};
use crate::AppState;

/// Most recent audit entries of the tenant
pub async fn list_audit_entries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<AuditFilter>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let service = AuditService::new(state.db);
    let entries = service.list_entries(&current_user.tenant(), filter).await?;
    Ok(Json(entries))
}
