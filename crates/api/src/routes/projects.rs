//! Route definitions for the `/projects` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::projects;
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                      -> list
/// POST   /                      -> create
/// GET    /{id}                  -> get_by_id
/// PUT    /{id}                  -> update
/// GET    /{id}/documents        -> list_documents
/// POST   /{id}/documents        -> attach_document
/// POST   /{id}/submit           -> submit
/// POST   /{id}/start-review     -> start_review
/// POST   /{id}/evaluate         -> evaluate
/// POST   /{id}/cancel           -> cancel
/// POST   /{id}/finish           -> finish
/// GET    /{id}/contracts        -> list_contracts
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(projects::list).post(projects::create))
        .route("/{id}", get(projects::get_by_id).put(projects::update))
        .route(
            "/{id}/documents",
            get(projects::list_documents).post(projects::attach_document),
        )
        .route("/{id}/submit", post(projects::submit))
        .route("/{id}/start-review", post(projects::start_review))
        .route("/{id}/evaluate", post(projects::evaluate))
        .route("/{id}/cancel", post(projects::cancel))
        .route("/{id}/finish", post(projects::finish))
        .route("/{id}/contracts", get(projects::list_contracts))
}
