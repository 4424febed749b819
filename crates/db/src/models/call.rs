//! Funding call (edital) models and DTOs.

use cultura_core::status::CallStatus;
use cultura_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `calls` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Call {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub regulations: Option<String>,
    pub open_at: Timestamp,
    pub close_at: Timestamp,
    pub result_at: Option<Timestamp>,
    pub total_budget: Money,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: CallStatus,
    pub required_document_categories: Vec<String>,
    pub evaluation_criteria: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a call. New calls always start in `draft`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCall {
    pub title: String,
    pub description: Option<String>,
    pub regulations: Option<String>,
    pub open_at: Timestamp,
    pub close_at: Timestamp,
    pub result_at: Option<Timestamp>,
    #[serde(default)]
    pub total_budget: Money,
    #[serde(default)]
    pub required_document_categories: Vec<String>,
    pub evaluation_criteria: Option<String>,
}

/// DTO for updating a call. All fields are optional; status moves go
/// through the transition endpoint instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCall {
    pub title: Option<String>,
    pub description: Option<String>,
    pub regulations: Option<String>,
    pub open_at: Option<Timestamp>,
    pub close_at: Option<Timestamp>,
    pub result_at: Option<Timestamp>,
    pub total_budget: Option<Money>,
    pub required_document_categories: Option<Vec<String>>,
    pub evaluation_criteria: Option<String>,
}

/// Query parameters for listing calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallFilter {
    pub status: Option<CallStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
