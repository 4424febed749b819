//! Repository for the `calls` table.

use cultura_core::search::{clamp_limit, clamp_offset, ilike_pattern, DEFAULT_LIMIT, MAX_LIMIT};
use cultura_core::status::CallStatus;
use cultura_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use super::status_ids;
use crate::models::call::{Call, CallFilter, CreateCall, UpdateCall};

/// Column list for SELECT / RETURNING. `project_seq` is internal.
const COLUMNS: &str = "\
    id, title, description, regulations, open_at, close_at, result_at, \
    total_budget, status_id, required_document_categories, evaluation_criteria, \
    created_by, created_at, updated_at";

/// Provides CRUD operations for funding calls.
pub struct CallRepo;

impl CallRepo {
    /// Insert a new call in `draft`.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateCall,
        created_by: Option<DbId>,
    ) -> Result<Call, sqlx::Error> {
        let query = format!(
            "INSERT INTO calls \
                (title, description, regulations, open_at, close_at, result_at, \
                 total_budget, status_id, required_document_categories, \
                 evaluation_criteria, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(&input.regulations)
            .bind(input.open_at)
            .bind(input.close_at)
            .bind(input.result_at)
            .bind(input.total_budget)
            .bind(CallStatus::Draft.id())
            .bind(&input.required_document_categories)
            .bind(&input.evaluation_criteria)
            .bind(created_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Call>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calls WHERE id = $1");
        sqlx::query_as::<_, Call>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List calls, newest opening first.
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &CallFilter,
    ) -> Result<Vec<Call>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calls \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
               AND ($2::TEXT IS NULL OR title ILIKE $2 OR description ILIKE $2) \
             ORDER BY open_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(filter.status.map(CallStatus::id))
            .bind(filter.search.as_deref().and_then(ilike_pattern))
            .bind(clamp_limit(filter.limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(filter.offset))
            .fetch_all(executor)
            .await
    }

    /// Apply a partial update while the status is one of `expected`.
    ///
    /// Returns `None` when the row is missing or its status moved.
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        expected: &[CallStatus],
        input: &UpdateCall,
    ) -> Result<Option<Call>, sqlx::Error> {
        let query = format!(
            "UPDATE calls SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                regulations = COALESCE($5, regulations), \
                open_at = COALESCE($6, open_at), \
                close_at = COALESCE($7, close_at), \
                result_at = COALESCE($8, result_at), \
                total_budget = COALESCE($9, total_budget), \
                required_document_categories = COALESCE($10, required_document_categories), \
                evaluation_criteria = COALESCE($11, evaluation_criteria) \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(id)
            .bind(status_ids(expected))
            .bind(input.title.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.regulations)
            .bind(input.open_at)
            .bind(input.close_at)
            .bind(input.result_at)
            .bind(input.total_budget)
            .bind(&input.required_document_categories)
            .bind(&input.evaluation_criteria)
            .fetch_optional(executor)
            .await
    }

    /// Compare-and-swap the status from any of `from` to `to`.
    pub async fn transition<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from: &[CallStatus],
        to: CallStatus,
    ) -> Result<Option<Call>, sqlx::Error> {
        let query = format!(
            "UPDATE calls SET status_id = $3 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(id)
            .bind(status_ids(from))
            .bind(to.id())
            .fetch_optional(executor)
            .await
    }

    /// Delete a call. A referencing project surfaces as a foreign key
    /// violation. Returns `true` if a row was removed.
    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM calls WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_projects<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM projects WHERE call_id = $1")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Published or ongoing calls whose closing time has passed.
    pub async fn list_expired<'e, E: PgExecutor<'e>>(
        executor: E,
        now: Timestamp,
    ) -> Result<Vec<Call>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calls \
             WHERE status_id = ANY($1) AND close_at < $2 \
             ORDER BY close_at, id"
        );
        sqlx::query_as::<_, Call>(&query)
            .bind(status_ids(&[CallStatus::Published, CallStatus::Ongoing]))
            .bind(now)
            .fetch_all(executor)
            .await
    }

    /// Atomically take the next project sequence number for a call.
    ///
    /// The row lock is held until the surrounding transaction ends, so
    /// concurrent creations on one call serialize here.
    pub async fn next_project_sequence<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE calls SET project_seq = project_seq + 1 WHERE id = $1 RETURNING project_seq",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}
