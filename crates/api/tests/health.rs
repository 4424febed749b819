mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, get_auth};

#[tokio::test]
async fn health_reports_ok() {
    let app = build_test_app();

    let response = get(app.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn health_degrades_when_store_is_down() {
    let app = build_test_app();
    app.store.set_unavailable(true);

    let response = get(app.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["db_healthy"], false);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = build_test_app();

    let response = get(app.app(), "/health").await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_test_app();

    let response = get(app.app(), "/api/v1/does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = build_test_app();

    let response = get(app.app(), "/api/v1/calls").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");

    let response = get_auth(app.app(), "/api/v1/calls", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A well-signed token with a role the platform does not know.
    let response = get_auth(app.app(), "/api/v1/calls", &app.token(9, "superuser")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unregistered_user_has_no_applicant_record() {
    let app = build_test_app();
    let token = app.token(300, "applicant");

    let response = get_auth(app.app(), "/api/v1/applicants/me", &token).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"].is_null());
}
