use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cultura_core::error::CoreError;
use serde_json::{json, Value};

/// Message returned in place of any infrastructure failure.
const SANITIZED_MESSAGE: &str = "An internal error occurred";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses of
/// the shape `{ "error", "code", "details"? }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from the lifecycle services.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    SANITIZED_MESSAGE.to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Map a [`CoreError`] onto status, code, message and optional details.
///
/// - Malformed input is 400, missing entities 404, status conflicts and lost
///   races 409, window and completeness failures 422.
/// - A dead signing token is 410.
/// - Infrastructure failures are 500 with a sanitized message.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String, Option<Value>) {
    let code = err.code();
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            code,
            format!("{entity} with id {id} not found"),
            None,
        ),
        CoreError::Validation { field, message } => (
            StatusCode::BAD_REQUEST,
            code,
            format!("{field}: {message}"),
            Some(json!({ "field": field })),
        ),
        CoreError::InvalidTransition { entity, from, to } => (
            StatusCode::CONFLICT,
            code,
            err.to_string(),
            Some(json!({ "entity": entity, "from": from, "to": to })),
        ),
        CoreError::OutsideSubmissionWindow {
            call_id,
            open_at,
            close_at,
            at,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            code,
            "The call is not accepting submissions at this time".to_string(),
            Some(json!({
                "call_id": call_id,
                "open_at": open_at,
                "close_at": close_at,
                "at": at,
            })),
        ),
        CoreError::IncompleteSubmission {
            missing_fields,
            missing_documents,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            code,
            err.to_string(),
            Some(json!({
                "missing_fields": missing_fields,
                "missing_documents": missing_documents,
            })),
        ),
        CoreError::NotSubmittable { project_id, status } => (
            StatusCode::CONFLICT,
            code,
            err.to_string(),
            Some(json!({ "project_id": project_id, "status": status })),
        ),
        CoreError::CannotSign {
            contract_id,
            status,
        } => (
            StatusCode::CONFLICT,
            code,
            err.to_string(),
            Some(json!({ "contract_id": contract_id, "status": status })),
        ),
        CoreError::AlreadySigned { .. }
        | CoreError::Conflict(_)
        | CoreError::ConcurrencyConflict(_) => {
            (StatusCode::CONFLICT, code, err.to_string(), None)
        }
        CoreError::InvalidOrExpiredToken => (StatusCode::GONE, code, err.to_string(), None),
        CoreError::IntegrityMismatch { contract_id, .. } => {
            tracing::error!(contract_id, error = %err, "Integrity mismatch reached the API");
            (
                StatusCode::CONFLICT,
                code,
                "The document no longer matches its recorded hash; an administrator has been alerted"
                    .to_string(),
                Some(json!({ "contract_id": contract_id })),
            )
        }
        CoreError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, code, msg.clone(), None),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, code, msg.clone(), None),
        CoreError::Storage(msg) | CoreError::Internal(msg) => {
            tracing::error!(error = %msg, code, "Infrastructure error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                SANITIZED_MESSAGE.to_string(),
                None,
            )
        }
    }
}
