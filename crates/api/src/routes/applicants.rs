//! Route definitions for the `/applicants` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::applicants;
use crate::state::AppState;

/// Routes mounted at `/applicants`.
///
/// ```text
/// GET    /                      -> list
/// POST   /                      -> register
/// GET    /me                    -> me
/// GET    /{id}                  -> get_by_id
/// PUT    /{id}                  -> update
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(applicants::list).post(applicants::register))
        .route("/me", get(applicants::me))
        .route("/{id}", get(applicants::get_by_id).put(applicants::update))
}
