//! Repository for the `applicants` table.

use cultura_core::search::{clamp_limit, clamp_offset, ilike_pattern, DEFAULT_LIMIT, MAX_LIMIT};
use cultura_core::status::ApplicantStatus;
use cultura_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::applicant::{Applicant, ApplicantFilter, CreateApplicant, UpdateApplicant};

const COLUMNS: &str = "\
    id, user_id, unique_code, legal_kind_id, full_name, tax_id, email, phone, \
    whatsapp, address, city, state, postal_code, status_id, created_at, updated_at";

/// Provides CRUD operations for applicants.
pub struct ApplicantRepo;

impl ApplicantRepo {
    /// Insert an applicant. `input` must already be normalized.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateApplicant,
        unique_code: &str,
    ) -> Result<Applicant, sqlx::Error> {
        let query = format!(
            "INSERT INTO applicants \
                (user_id, unique_code, legal_kind_id, full_name, tax_id, email, phone, \
                 whatsapp, address, city, state, postal_code, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Applicant>(&query)
            .bind(input.user_id)
            .bind(unique_code)
            .bind(input.legal_kind.id())
            .bind(&input.full_name)
            .bind(&input.tax_id)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.whatsapp)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(ApplicantStatus::Active.id())
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Applicant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM applicants WHERE id = $1");
        sqlx::query_as::<_, Applicant>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// The applicant owned by a user identity, if any.
    pub async fn find_by_user_id<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: DbId,
    ) -> Result<Option<Applicant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM applicants WHERE user_id = $1 ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Applicant>(&query)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn code_exists<'e, E: PgExecutor<'e>>(
        executor: E,
        unique_code: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM applicants WHERE unique_code = $1)")
            .bind(unique_code)
            .fetch_one(executor)
            .await
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &ApplicantFilter,
    ) -> Result<Vec<Applicant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM applicants \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
               AND ($2::TEXT IS NULL OR full_name ILIKE $2 OR email ILIKE $2 \
                    OR unique_code ILIKE $2 OR tax_id ILIKE $2) \
             ORDER BY full_name, id \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Applicant>(&query)
            .bind(filter.status.map(ApplicantStatus::id))
            .bind(filter.search.as_deref().and_then(ilike_pattern))
            .bind(clamp_limit(filter.limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(filter.offset))
            .fetch_all(executor)
            .await
    }

    /// Apply a partial update. `input` must already be normalized.
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        input: &UpdateApplicant,
    ) -> Result<Option<Applicant>, sqlx::Error> {
        let query = format!(
            "UPDATE applicants SET \
                full_name = COALESCE($2, full_name), \
                email = COALESCE($3, email), \
                phone = COALESCE($4, phone), \
                whatsapp = COALESCE($5, whatsapp), \
                address = COALESCE($6, address), \
                city = COALESCE($7, city), \
                state = COALESCE($8, state), \
                postal_code = COALESCE($9, postal_code), \
                status_id = COALESCE($10, status_id) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Applicant>(&query)
            .bind(id)
            .bind(&input.full_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.whatsapp)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(input.status.map(ApplicantStatus::id))
            .fetch_optional(executor)
            .await
    }
}
