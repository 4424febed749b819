//! Handlers for the `/contracts` resource (contratos).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cultura_core::types::{Date, DbId};
use cultura_db::models::contract::{CreateContract, UpdateContract};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /contracts/{id}/send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

fn default_channels() -> Vec<String> {
    vec!["email".to_string()]
}

/// Body of `POST /contracts/{id}/terminate`.
#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    #[serde(default)]
    pub reason: String,
}

/// Query parameters of `POST /contracts/expire-lapsed`.
#[derive(Debug, Default, Deserialize)]
pub struct ExpireParams {
    /// Reference date; the server's current date when absent.
    pub today: Option<Date>,
}

// ---------------------------------------------------------------------------
// Drafting
// ---------------------------------------------------------------------------

/// POST /api/v1/contracts
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Json(input): Json<CreateContract>,
) -> AppResult<impl IntoResponse> {
    let contract = state
        .services
        .contracts
        .create(&auth.caller, &ctx, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: contract })))
}

/// GET /api/v1/contracts/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let contract = state.services.contracts.get(&auth.caller, id).await?;
    Ok(Json(DataResponse { data: contract }))
}

/// PUT /api/v1/contracts/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateContract>,
) -> AppResult<impl IntoResponse> {
    let contract = state
        .services
        .contracts
        .update(&auth.caller, &ctx, id, patch)
        .await?;
    Ok(Json(DataResponse { data: contract }))
}

/// POST /api/v1/contracts/{id}/regenerate-artifact
pub async fn regenerate_artifact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let contract = state
        .services
        .contracts
        .regenerate_artifact(&auth.caller, id)
        .await?;
    Ok(Json(DataResponse { data: contract }))
}

// ---------------------------------------------------------------------------
// Sending and verification
// ---------------------------------------------------------------------------

/// POST /api/v1/contracts/{id}/send
///
/// The response carries the signing link and the plaintext token. It is the
/// only place the plaintext ever appears.
pub async fn send(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(body): Json<SendRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .services
        .contracts
        .send(&auth.caller, &ctx, id, &body.channels)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/contracts/{id}/verify
pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state
        .services
        .contracts
        .verify_integrity(&auth.caller, &ctx, id)
        .await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// Administrative moves
// ---------------------------------------------------------------------------

/// POST /api/v1/contracts/{id}/terminate
pub async fn terminate(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(body): Json<TerminateRequest>,
) -> AppResult<impl IntoResponse> {
    let contract = state
        .services
        .contracts
        .terminate(&auth.caller, &ctx, id, &body.reason)
        .await?;
    Ok(Json(DataResponse { data: contract }))
}

/// POST /api/v1/contracts/expire-lapsed
pub async fn expire_lapsed(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Query(params): Query<ExpireParams>,
) -> AppResult<impl IntoResponse> {
    let expired = state
        .services
        .contracts
        .expire_lapsed(&auth.caller, &ctx, params.today)
        .await?;
    Ok(Json(DataResponse { data: expired }))
}

/// GET /api/v1/contracts/reconciliation-issues
pub async fn reconciliation_issues(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let issues = state
        .services
        .contracts
        .reconciliation_issues(&auth.caller)
        .await?;
    Ok(Json(DataResponse { data: issues }))
}

/// POST /api/v1/contracts/reconciliation-issues/{id}/resolve
pub async fn resolve_reconciliation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let issue = state
        .services
        .contracts
        .resolve_reconciliation(&auth.caller, id)
        .await?;
    Ok(Json(DataResponse { data: issue }))
}
