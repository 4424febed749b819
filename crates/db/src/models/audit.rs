//! Audit trail models. Rows are append-only (no update DTO).

use cultura_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `audit_events` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AuditEvent {
    pub id: DbId,
    pub actor_id: Option<DbId>,
    pub action: String,
    pub subject_kind: String,
    pub subject_id: DbId,
    pub before_snapshot: Option<serde_json::Value>,
    pub after_snapshot: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAuditEvent {
    pub actor_id: Option<DbId>,
    pub action: String,
    pub subject_kind: String,
    pub subject_id: DbId,
    pub before_snapshot: Option<serde_json::Value>,
    pub after_snapshot: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: Timestamp,
}
