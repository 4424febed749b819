//! Repository for the `reconciliation_issues` table.

use cultura_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::reconciliation::ReconciliationIssue;

const COLUMNS: &str = "id, contract_id, project_id, reason, resolved_at, created_at";

pub struct ReconciliationRepo;

impl ReconciliationRepo {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        contract_id: DbId,
        project_id: DbId,
        reason: &str,
    ) -> Result<ReconciliationIssue, sqlx::Error> {
        let query = format!(
            "INSERT INTO reconciliation_issues (contract_id, project_id, reason) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReconciliationIssue>(&query)
            .bind(contract_id)
            .bind(project_id)
            .bind(reason)
            .fetch_one(executor)
            .await
    }

    /// Unresolved issues, oldest first.
    pub async fn list_open<'e, E: PgExecutor<'e>>(
        executor: E,
    ) -> Result<Vec<ReconciliationIssue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM reconciliation_issues \
             WHERE resolved_at IS NULL ORDER BY created_at, id"
        );
        sqlx::query_as::<_, ReconciliationIssue>(&query)
            .fetch_all(executor)
            .await
    }

    pub async fn resolve<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        resolved_at: Timestamp,
    ) -> Result<Option<ReconciliationIssue>, sqlx::Error> {
        let query = format!(
            "UPDATE reconciliation_issues SET resolved_at = $2 \
             WHERE id = $1 AND resolved_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReconciliationIssue>(&query)
            .bind(id)
            .bind(resolved_at)
            .fetch_optional(executor)
            .await
    }
}
