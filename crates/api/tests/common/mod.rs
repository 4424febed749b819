#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use cultura_api::auth::jwt::{generate_access_token, JwtConfig};
use cultura_api::config::ServerConfig;
use cultura_api::router::build_app_router;
use cultura_api::state::AppState;
use cultura_core::clock::FixedClock;
use cultura_core::config::LifecycleConfig;
use cultura_core::types::{DbId, Timestamp};
use cultura_events::EventBus;
use cultura_lifecycle::{Collaborators, LifecycleServices, MemoryStore, Shared};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        artifacts_dir: PathBuf::from("./artifacts"),
        event_webhook_url: None,
        signing_webhook_url: None,
        sweep_interval_secs: 86_400,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            issuer: None,
            access_token_expiry_mins: 15,
        },
        lifecycle: LifecycleConfig::default(),
    }
}

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// The full router over an in-memory store, with the service clock held at
/// 2024-01-10 09:00 UTC.
pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    pub clock: Arc<FixedClock>,
    pub store: Arc<MemoryStore>,
    pub services: Arc<LifecycleServices>,
    _artifacts: tempfile::TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// A bearer token for `user_id` holding `role`.
    pub fn token(&self, user_id: DbId, role: &str) -> String {
        generate_access_token(user_id, role, &self.config.jwt).unwrap()
    }
}

pub fn build_test_app() -> TestApp {
    let mut config = test_config();
    let artifacts = tempfile::tempdir().unwrap();
    config.artifacts_dir = artifacts.path().to_path_buf();

    let clock = Arc::new(FixedClock::new(ts(2024, 1, 10, 9, 0, 0)));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let shared = Shared::new(
        store.clone(),
        Arc::new(EventBus::default()),
        clock.clone(),
        config.lifecycle.clone(),
    );
    let collaborators = Collaborators::local(store.clone(), config.artifacts_dir.clone());
    let services = Arc::new(LifecycleServices::new(shared, collaborators));

    let state = AppState {
        services: Arc::clone(&services),
        config: Arc::new(config.clone()),
    };
    let router = build_app_router(state, &config);

    TestApp {
        router,
        config,
        clock,
        store,
        services,
        _artifacts: artifacts,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    json_auth(app, "POST", uri, token, body).await
}

pub async fn put_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    json_auth(app, "PUT", uri, token, body).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn json_auth(
    app: Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
