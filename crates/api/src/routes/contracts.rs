//! Route definitions for the `/contracts` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::contracts;
use crate::state::AppState;

/// Routes mounted at `/contracts`.
///
/// ```text
/// POST   /                                   -> create
/// POST   /expire-lapsed                      -> expire_lapsed
/// GET    /reconciliation-issues              -> reconciliation_issues
/// POST   /reconciliation-issues/{id}/resolve -> resolve_reconciliation
/// GET    /{id}                               -> get_by_id
/// PUT    /{id}                               -> update
/// POST   /{id}/send                          -> send
/// POST   /{id}/verify                        -> verify
/// POST   /{id}/terminate                     -> terminate
/// POST   /{id}/regenerate-artifact           -> regenerate_artifact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(contracts::create))
        .route("/expire-lapsed", post(contracts::expire_lapsed))
        .route(
            "/reconciliation-issues",
            get(contracts::reconciliation_issues),
        )
        .route(
            "/reconciliation-issues/{id}/resolve",
            post(contracts::resolve_reconciliation),
        )
        .route("/{id}", get(contracts::get_by_id).put(contracts::update))
        .route("/{id}/send", post(contracts::send))
        .route("/{id}/verify", post(contracts::verify))
        .route("/{id}/terminate", post(contracts::terminate))
        .route(
            "/{id}/regenerate-artifact",
            post(contracts::regenerate_artifact),
        )
}
