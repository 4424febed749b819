//! Handlers for the `/projects` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cultura_core::project::EvaluationDecision;
use cultura_core::types::DbId;
use cultura_db::models::project::{CreateProject, ProjectFilter, UpdateProject};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /projects/{id}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

/// Body of `POST /projects/{id}/documents`.
#[derive(Debug, Deserialize)]
pub struct AttachDocumentRequest {
    pub category: String,
    pub file_name: String,
}

// ---------------------------------------------------------------------------
// Drafting
// ---------------------------------------------------------------------------

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Json(input): Json<CreateProject>,
) -> AppResult<impl IntoResponse> {
    let project = state
        .services
        .projects
        .create(&auth.caller, &ctx, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ProjectFilter>,
) -> AppResult<impl IntoResponse> {
    let projects = state.services.projects.list(&auth.caller, &filter).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = state.services.projects.get(&auth.caller, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/projects/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateProject>,
) -> AppResult<impl IntoResponse> {
    let project = state
        .services
        .projects
        .update(&auth.caller, &ctx, id, patch)
        .await?;
    Ok(Json(DataResponse { data: project }))
}

/// POST /api/v1/projects/{id}/documents
pub async fn attach_document(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(body): Json<AttachDocumentRequest>,
) -> AppResult<impl IntoResponse> {
    let document = state
        .services
        .projects
        .attach_document(&auth.caller, &ctx, id, &body.category, &body.file_name)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: document })))
}

/// GET /api/v1/projects/{id}/documents
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let documents = state.services.projects.documents(&auth.caller, id).await?;
    Ok(Json(DataResponse { data: documents }))
}

// ---------------------------------------------------------------------------
// Submission and evaluation
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/submit
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = state.services.projects.submit(&auth.caller, &ctx, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// POST /api/v1/projects/{id}/start-review
pub async fn start_review(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = state
        .services
        .projects
        .start_review(&auth.caller, &ctx, id)
        .await?;
    Ok(Json(DataResponse { data: project }))
}

/// POST /api/v1/projects/{id}/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(decision): Json<EvaluationDecision>,
) -> AppResult<impl IntoResponse> {
    let project = state
        .services
        .projects
        .evaluate(&auth.caller, &ctx, id, decision)
        .await?;
    Ok(Json(DataResponse { data: project }))
}

// ---------------------------------------------------------------------------
// Administrative moves
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(body): Json<CancelRequest>,
) -> AppResult<impl IntoResponse> {
    let project = state
        .services
        .projects
        .cancel(&auth.caller, &ctx, id, &body.reason)
        .await?;
    Ok(Json(DataResponse { data: project }))
}

/// POST /api/v1/projects/{id}/finish
pub async fn finish(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = state.services.projects.finish(&auth.caller, &ctx, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// GET /api/v1/projects/{id}/contracts
pub async fn list_contracts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let contracts = state
        .services
        .contracts
        .list_for_project(&auth.caller, id)
        .await?;
    Ok(Json(DataResponse { data: contracts }))
}
