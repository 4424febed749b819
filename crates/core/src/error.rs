use crate::types::{DbId, Timestamp};

/// Domain error shared by every lifecycle component.
///
/// Business-rule violations are always returned as one of these variants;
/// only [`CoreError::Storage`] and [`CoreError::Internal`] represent
/// infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Invalid {entity} transition from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Call {call_id} is not accepting submissions at {at} (window {open_at} .. {close_at})")]
    OutsideSubmissionWindow {
        call_id: DbId,
        open_at: Timestamp,
        close_at: Timestamp,
        at: Timestamp,
    },

    #[error(
        "Submission incomplete: missing fields [{}], missing documents [{}]",
        .missing_fields.join(", "),
        .missing_documents.join(", ")
    )]
    IncompleteSubmission {
        missing_fields: Vec<String>,
        missing_documents: Vec<String>,
    },

    #[error("Project {project_id} cannot be submitted from status '{status}'")]
    NotSubmittable { project_id: DbId, status: String },

    #[error("Contract {contract_id} cannot be signed in status '{status}'")]
    CannotSign { contract_id: DbId, status: String },

    #[error("Contract {contract_id} is already signed")]
    AlreadySigned { contract_id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    #[error("Invalid or expired signing token")]
    InvalidOrExpiredToken,

    #[error("Integrity mismatch on contract {contract_id}: expected {expected}, computed {actual}")]
    IntegrityMismatch {
        contract_id: DbId,
        expected: String,
        actual: String,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a [`CoreError::Validation`] for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a [`CoreError::InvalidTransition`] from any displayable statuses.
    pub fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Stable machine-readable code for the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::OutsideSubmissionWindow { .. } => "OUTSIDE_SUBMISSION_WINDOW",
            Self::IncompleteSubmission { .. } => "INCOMPLETE_SUBMISSION",
            Self::NotSubmittable { .. } => "NOT_SUBMITTABLE",
            Self::CannotSign { .. } => "CANNOT_SIGN",
            Self::AlreadySigned { .. } => "ALREADY_SIGNED",
            Self::Conflict(_) => "CONFLICT",
            Self::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            Self::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            Self::IntegrityMismatch { .. } => "INTEGRITY_MISMATCH",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Storage(_) => "STORAGE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for failures that are not the caller's fault.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}
