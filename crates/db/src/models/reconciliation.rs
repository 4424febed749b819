//! Signed contracts whose project did not follow into execution.

use cultura_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `reconciliation_issues` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ReconciliationIssue {
    pub id: DbId,
    pub contract_id: DbId,
    pub project_id: DbId,
    pub reason: String,
    pub resolved_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
