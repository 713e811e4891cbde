//! Audit trail writer
//!
//! Entries are appended on the caller's transaction so they commit or roll
//! back together with the mutation they describe. The table rejects UPDATE
//! and DELETE at the database level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use shared::{AuditAction, TenantContext};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;

/// Audit service for reading the trail
#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

/// One immutable audit record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing entries
#[derive(Debug, Default, Deserialize)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub limit: Option<i64>,
}

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

/// Append one entry on `conn`, normally `&mut *tx`
pub async fn record(
    conn: &mut PgConnection,
    tenant: &TenantContext,
    action: AuditAction,
    details: JsonValue,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log_entries (company_id, actor_id, action, details)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(tenant.company_id)
    .bind(tenant.actor_id)
    .bind(action.as_str())
    .bind(details)
    .execute(conn)
    .await?;

    Ok(())
}

impl AuditService {
    /// Create a new AuditService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Most recent entries for the tenant, newest first
    pub async fn list_entries(&self, tenant: &TenantContext, filter: AuditFilter) -> AppResult<Vec<AuditEntry>> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, company_id, actor_id, action, details, created_at
            FROM audit_log_entries
            WHERE company_id = $1 AND ($2::TEXT IS NULL OR action = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(tenant.company_id)
        .bind(filter.action.map(|a| a.as_str()))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Stock movements of one product, optionally narrowed to one location.
    ///
    /// Transfers match on either side of the move.
    pub async fn stock_history(
        &self,
        tenant: &TenantContext,
        product_id: Uuid,
        location_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> AppResult<Vec<AuditEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let actions: Vec<&str> = AuditAction::STOCK_MOVEMENTS.iter().map(|a| a.as_str()).collect();
        let location = location_id.map(|id| id.to_string());

        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, company_id, actor_id, action, details, created_at
            FROM audit_log_entries
            WHERE company_id = $1
              AND action = ANY($2)
              AND details->>'product_id' = $3
              AND (
                  $4::TEXT IS NULL
                  OR details->>'location_id' = $4
                  OR details->>'from_location_id' = $4
                  OR details->>'to_location_id' = $4
              )
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(tenant.company_id)
        .bind(actions)
        .bind(product_id.to_string())
        .bind(location)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }
}
