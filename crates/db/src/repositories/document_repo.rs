//! Repository for the `documents` existence index.

use cultura_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::document::{CreateDocument, Document};

const COLUMNS: &str =
    "id, subject_kind, subject_id, category, file_name, uploaded_by, created_at";

/// Provides insert and existence queries for uploaded documents.
pub struct DocumentRepo;

impl DocumentRepo {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateDocument,
        uploaded_by: Option<DbId>,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents (subject_kind, subject_id, category, file_name, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(&input.subject_kind)
            .bind(input.subject_id)
            .bind(&input.category)
            .bind(&input.file_name)
            .bind(uploaded_by)
            .fetch_one(executor)
            .await
    }

    /// Whether the subject has at least one document in `category`.
    pub async fn exists<'e, E: PgExecutor<'e>>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
        category: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents \
             WHERE subject_kind = $1 AND subject_id = $2 AND category = $3)",
        )
        .bind(subject_kind)
        .bind(subject_id)
        .bind(category)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_subject<'e, E: PgExecutor<'e>>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
    ) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents \
             WHERE subject_kind = $1 AND subject_id = $2 \
             ORDER BY category, id"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(subject_kind)
            .bind(subject_id)
            .fetch_all(executor)
            .await
    }
}
