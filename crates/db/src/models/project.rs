//! Project (projeto) models and DTOs.

use cultura_core::project::Narrative;
use cultura_core::status::ProjectStatus;
use cultura_core::types::{DbId, Money, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `projects` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub call_id: DbId,
    pub applicant_id: DbId,
    pub project_code: String,
    pub title: String,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub justification: Option<String>,
    pub methodology: Option<String>,
    pub schedule: serde_json::Value,
    pub budget: serde_json::Value,
    pub requested_amount: Money,
    pub approved_amount: Option<Money>,
    pub counterpart_amount: Money,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: ProjectStatus,
    pub evaluation_grade: Option<Decimal>,
    pub technical_opinion: Option<String>,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub evaluated_by: Option<DbId>,
    pub evaluated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// The narrative fields checked before submission.
    pub fn narrative(&self) -> Narrative<'_> {
        Narrative {
            title: &self.title,
            description: self.description.as_deref(),
            objectives: self.objectives.as_deref(),
            justification: self.justification.as_deref(),
            methodology: self.methodology.as_deref(),
            schedule: &self.schedule,
            budget: &self.budget,
        }
    }

    /// Whether an evaluation has been recorded.
    pub fn is_evaluated(&self) -> bool {
        self.evaluated_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a project. The code is derived from the call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub call_id: DbId,
    pub applicant_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub justification: Option<String>,
    pub methodology: Option<String>,
    #[serde(default)]
    pub schedule: serde_json::Value,
    #[serde(default)]
    pub budget: serde_json::Value,
    pub requested_amount: Money,
    #[serde(default)]
    pub counterpart_amount: Money,
}

/// DTO for editing a project's narrative and amounts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub justification: Option<String>,
    pub methodology: Option<String>,
    pub schedule: Option<serde_json::Value>,
    pub budget: Option<serde_json::Value>,
    pub requested_amount: Option<Money>,
    pub counterpart_amount: Option<Money>,
}

/// Columns written together with an evaluation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub status: ProjectStatus,
    pub approved_amount: Option<Money>,
    pub grade: Option<Decimal>,
    pub technical_opinion: Option<String>,
    pub rejection_reason: Option<String>,
    pub evaluated_by: Option<DbId>,
    pub evaluated_at: Timestamp,
}

/// Query parameters for listing projects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub call_id: Option<DbId>,
    pub applicant_id: Option<DbId>,
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
