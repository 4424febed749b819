//! Public signing endpoints.
//!
//! These are the only routes without a bearer token: possession of the
//! signing token issued by `send` is the credential.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use cultura_core::types::DbId;
use cultura_lifecycle::SignRequest;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters of the signing page.
#[derive(Deserialize)]
pub struct SigningParams {
    #[serde(default)]
    pub token: String,
}

/// GET /api/v1/public/contracts/{id}/signing?token=...
///
/// The document as the signer will sign it, including the hash to echo
/// back on signature.
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<SigningParams>,
) -> AppResult<impl IntoResponse> {
    let view = state
        .services
        .contracts
        .signing_view(id, &params.token)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/public/contracts/{id}/sign
///
/// Answers with a [`SignedReceipt`](cultura_lifecycle::SignedReceipt), never the full contract row.
pub async fn sign(
    State(state): State<AppState>,
    ClientContext(ctx): ClientContext,
    Path(id): Path<DbId>,
    Json(request): Json<SignRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!(contract_id = id, ip = ctx.ip_or_unknown(), "Signature submitted");
    let outcome = state.services.contracts.sign(id, request, &ctx).await?;
    Ok(Json(DataResponse {
        data: outcome.receipt(),
    }))
}
