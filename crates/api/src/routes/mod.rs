pub mod applicants;
pub mod audit;
pub mod calls;
pub mod contracts;
pub mod health;
pub mod projects;
pub mod signing;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /calls                                         list, create
/// /calls/close-expired                           sweep expired calls (POST)
/// /calls/{id}                                    get, update, delete
/// /calls/{id}/transition                         status move (POST)
///
/// /applicants                                    list, register
/// /applicants/me                                 caller's own record
/// /applicants/{id}                               get, update
///
/// /projects                                      list, create
/// /projects/{id}                                 get, update
/// /projects/{id}/documents                       list, attach
/// /projects/{id}/submit                          submit (POST)
/// /projects/{id}/start-review                    start review (POST)
/// /projects/{id}/evaluate                        evaluate (POST)
/// /projects/{id}/cancel                          cancel (POST)
/// /projects/{id}/finish                          finish (POST)
/// /projects/{id}/contracts                       contracts of a project
///
/// /contracts                                     create
/// /contracts/expire-lapsed                       expire lapsed contracts (POST)
/// /contracts/reconciliation-issues               open issues
/// /contracts/reconciliation-issues/{id}/resolve  resolve (POST)
/// /contracts/{id}                                get, update
/// /contracts/{id}/send                           issue token and notify (POST)
/// /contracts/{id}/verify                         integrity check (POST)
/// /contracts/{id}/terminate                      terminate (POST)
/// /contracts/{id}/regenerate-artifact            re-render (POST)
///
/// /audit/{subject_kind}/{subject_id}             audit trail
///
/// /public/contracts/{id}/signing                 signing view (token in query)
/// /public/contracts/{id}/sign                    sign (POST, no JWT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/calls", calls::router())
        .nest("/applicants", applicants::router())
        .nest("/projects", projects::router())
        .nest("/contracts", contracts::router())
        .nest("/audit", audit::router())
        // Token-holder routes, no bearer JWT.
        .nest("/public/contracts", signing::router())
}
