//! Route definitions for the `/audit` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::audit;
use crate::state::AppState;

/// Routes mounted at `/audit`.
///
/// ```text
/// GET    /{subject_kind}/{subject_id}   -> trail
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{subject_kind}/{subject_id}", get(audit::trail))
}
