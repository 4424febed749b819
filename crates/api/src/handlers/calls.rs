//! Handlers for the `/calls` resource (editais).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cultura_core::status::CallStatus;
use cultura_core::types::DbId;
use cultura_db::models::call::{CallFilter, CreateCall, UpdateCall};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /calls/{id}/transition`.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: CallStatus,
}

/// POST /api/v1/calls
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Json(input): Json<CreateCall>,
) -> AppResult<impl IntoResponse> {
    let call = state.services.calls.create(&auth.caller, &ctx, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: call })))
}

/// GET /api/v1/calls
pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(filter): Query<CallFilter>,
) -> AppResult<impl IntoResponse> {
    let calls = state.services.calls.list(&filter).await?;
    Ok(Json(DataResponse { data: calls }))
}

/// GET /api/v1/calls/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let call = state.services.calls.get(id).await?;
    Ok(Json(DataResponse { data: call }))
}

/// PUT /api/v1/calls/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateCall>,
) -> AppResult<impl IntoResponse> {
    let call = state
        .services
        .calls
        .update(&auth.caller, &ctx, id, patch)
        .await?;
    Ok(Json(DataResponse { data: call }))
}

/// DELETE /api/v1/calls/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.services.calls.delete(&auth.caller, &ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/calls/{id}/transition
pub async fn transition(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(body): Json<TransitionRequest>,
) -> AppResult<impl IntoResponse> {
    let call = state
        .services
        .calls
        .transition(&auth.caller, &ctx, id, body.status)
        .await?;
    Ok(Json(DataResponse { data: call }))
}

/// POST /api/v1/calls/close-expired
///
/// Runs the same sweep as the background job, on demand.
pub async fn close_expired(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
) -> AppResult<impl IntoResponse> {
    let closed = state
        .services
        .calls
        .close_expired(&auth.caller, &ctx)
        .await?;
    Ok(Json(DataResponse { data: closed }))
}
