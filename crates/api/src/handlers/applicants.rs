//! Handlers for the `/applicants` resource (proponentes).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cultura_core::types::DbId;
use cultura_db::models::applicant::{ApplicantFilter, CreateApplicant, UpdateApplicant};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/applicants
///
/// Self-registration for applicants; back-office users register on behalf
/// of anyone.
pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Json(input): Json<CreateApplicant>,
) -> AppResult<impl IntoResponse> {
    let applicant = state
        .services
        .applicants
        .register(&auth.caller, &ctx, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: applicant })))
}

/// GET /api/v1/applicants
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ApplicantFilter>,
) -> AppResult<impl IntoResponse> {
    let applicants = state
        .services
        .applicants
        .list(&auth.caller, &filter)
        .await?;
    Ok(Json(DataResponse { data: applicants }))
}

/// GET /api/v1/applicants/me
///
/// The caller's own record, or `null` before registration.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<impl IntoResponse> {
    let applicant = state.services.applicants.find_for_user(auth.user_id).await?;
    Ok(Json(DataResponse { data: applicant }))
}

/// GET /api/v1/applicants/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let applicant = state.services.applicants.get(&auth.caller, id).await?;
    Ok(Json(DataResponse { data: applicant }))
}

/// PUT /api/v1/applicants/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateApplicant>,
) -> AppResult<impl IntoResponse> {
    let applicant = state
        .services
        .applicants
        .update(&auth.caller, &ctx, id, patch)
        .await?;
    Ok(Json(DataResponse { data: applicant }))
}
