//! Repository for the `projects` table.

use cultura_core::search::{clamp_limit, clamp_offset, ilike_pattern, DEFAULT_LIMIT, MAX_LIMIT};
use cultura_core::status::ProjectStatus;
use cultura_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use super::status_ids;
use crate::models::project::{CreateProject, EvaluationRecord, Project, ProjectFilter, UpdateProject};

const COLUMNS: &str = "\
    id, call_id, applicant_id, project_code, title, description, objectives, \
    justification, methodology, schedule, budget, requested_amount, approved_amount, \
    counterpart_amount, status_id, evaluation_grade, technical_opinion, \
    rejection_reason, submitted_at, evaluated_by, evaluated_at, created_at, updated_at";

/// Provides CRUD and status operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a project in `draft` with an already allocated code.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateProject,
        project_code: &str,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects \
                (call_id, applicant_id, project_code, title, description, objectives, \
                 justification, methodology, schedule, budget, requested_amount, \
                 counterpart_amount, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(input.call_id)
            .bind(input.applicant_id)
            .bind(project_code)
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(&input.objectives)
            .bind(&input.justification)
            .bind(&input.methodology)
            .bind(&input.schedule)
            .bind(&input.budget)
            .bind(input.requested_amount)
            .bind(input.counterpart_amount)
            .bind(ProjectStatus::Draft.id())
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// The applicant's project on a call, if one exists.
    pub async fn find_by_call_and_applicant<'e, E: PgExecutor<'e>>(
        executor: E,
        call_id: DbId,
        applicant_id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects WHERE call_id = $1 AND applicant_id = $2"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(call_id)
            .bind(applicant_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &ProjectFilter,
    ) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects \
             WHERE ($1::BIGINT IS NULL OR call_id = $1) \
               AND ($2::BIGINT IS NULL OR applicant_id = $2) \
               AND ($3::SMALLINT IS NULL OR status_id = $3) \
               AND ($4::TEXT IS NULL OR title ILIKE $4 OR project_code ILIKE $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(filter.call_id)
            .bind(filter.applicant_id)
            .bind(filter.status.map(ProjectStatus::id))
            .bind(filter.search.as_deref().and_then(ilike_pattern))
            .bind(clamp_limit(filter.limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(filter.offset))
            .fetch_all(executor)
            .await
    }

    /// Apply a partial update while the status is one of `expected`.
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        expected: &[ProjectStatus],
        input: &UpdateProject,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                objectives = COALESCE($5, objectives), \
                justification = COALESCE($6, justification), \
                methodology = COALESCE($7, methodology), \
                schedule = COALESCE($8, schedule), \
                budget = COALESCE($9, budget), \
                requested_amount = COALESCE($10, requested_amount), \
                counterpart_amount = COALESCE($11, counterpart_amount) \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(status_ids(expected))
            .bind(input.title.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.objectives)
            .bind(&input.justification)
            .bind(&input.methodology)
            .bind(&input.schedule)
            .bind(&input.budget)
            .bind(input.requested_amount)
            .bind(input.counterpart_amount)
            .fetch_optional(executor)
            .await
    }

    /// Compare-and-swap the status from any of `from` to `to`.
    pub async fn transition<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from: &[ProjectStatus],
        to: ProjectStatus,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET status_id = $3 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(status_ids(from))
            .bind(to.id())
            .fetch_optional(executor)
            .await
    }

    /// `draft -> submitted`, stamping the submission time.
    pub async fn submit<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        submitted_at: Timestamp,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET status_id = $2, submitted_at = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(ProjectStatus::Submitted.id())
            .bind(submitted_at)
            .bind(ProjectStatus::Draft.id())
            .fetch_optional(executor)
            .await
    }

    /// Record an evaluation outcome together with its status move.
    pub async fn evaluate<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from: &[ProjectStatus],
        record: &EvaluationRecord,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET \
                status_id = $3, \
                approved_amount = $4, \
                evaluation_grade = $5, \
                technical_opinion = $6, \
                rejection_reason = $7, \
                evaluated_by = $8, \
                evaluated_at = $9 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(status_ids(from))
            .bind(record.status.id())
            .bind(record.approved_amount)
            .bind(record.grade)
            .bind(&record.technical_opinion)
            .bind(&record.rejection_reason)
            .bind(record.evaluated_by)
            .bind(record.evaluated_at)
            .fetch_optional(executor)
            .await
    }
}
