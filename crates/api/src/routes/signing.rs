//! Route definitions for the public signing flow.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::signing;
use crate::state::AppState;

/// Routes mounted at `/public/contracts`. No bearer token required.
///
/// ```text
/// GET    /{id}/signing?token=   -> view
/// POST   /{id}/sign             -> sign
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/signing", get(signing::view))
        .route("/{id}/sign", post(signing::sign))
}
