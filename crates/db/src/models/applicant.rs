//! Applicant (proponente) models and DTOs.

use cultura_core::status::{ApplicantStatus, LegalKind};
use cultura_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `applicants` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Applicant {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub unique_code: String,
    #[sqlx(rename = "legal_kind_id", try_from = "i16")]
    pub legal_kind: LegalKind,
    pub full_name: String,
    pub tax_id: String,
    pub email: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: ApplicantStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering an applicant. `unique_code` is generated.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplicant {
    pub user_id: Option<DbId>,
    pub legal_kind: LegalKind,
    pub full_name: String,
    pub tax_id: String,
    pub email: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// DTO for updating an applicant. Tax id, legal kind and code are fixed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateApplicant {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub status: Option<ApplicantStatus>,
}

/// Query parameters for listing applicants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicantFilter {
    pub status: Option<ApplicantStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
