//! Route definitions for the `/calls` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::calls;
use crate::state::AppState;

/// Routes mounted at `/calls`.
///
/// ```text
/// GET    /                      -> list
/// POST   /                      -> create
/// POST   /close-expired         -> close_expired
/// GET    /{id}                  -> get_by_id
/// PUT    /{id}                  -> update
/// DELETE /{id}                  -> delete
/// POST   /{id}/transition       -> transition
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(calls::list).post(calls::create))
        .route("/close-expired", post(calls::close_expired))
        .route(
            "/{id}",
            get(calls::get_by_id)
                .put(calls::update)
                .delete(calls::delete),
        )
        .route("/{id}/transition", post(calls::transition))
}
