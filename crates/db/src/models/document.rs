//! Document index models. Only existence metadata lives here.

use cultura_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `documents` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Document {
    pub id: DbId,
    pub subject_kind: String,
    pub subject_id: DbId,
    pub category: String,
    pub file_name: String,
    pub uploaded_by: Option<DbId>,
    pub created_at: Timestamp,
}

/// DTO for registering an uploaded document.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocument {
    pub subject_kind: String,
    pub subject_id: DbId,
    pub category: String,
    pub file_name: String,
}
