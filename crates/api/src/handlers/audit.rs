//! Handler for reading the audit trail of one subject.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use cultura_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/audit/{subject_kind}/{subject_id}
///
/// Oldest entry first. Back-office callers only.
pub async fn trail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((subject_kind, subject_id)): Path<(String, DbId)>,
) -> AppResult<impl IntoResponse> {
    let entries = state
        .services
        .audit
        .trail(&auth.caller, &subject_kind, subject_id)
        .await?;
    Ok(Json(DataResponse { data: entries }))
}
