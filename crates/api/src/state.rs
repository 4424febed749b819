use std::sync::Arc;

use cultura_lifecycle::LifecycleServices;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Every lifecycle service, wired over one store, bus and clock.
    pub services: Arc<LifecycleServices>,
    /// Server configuration (JWT secret, CORS, timeouts).
    pub config: Arc<ServerConfig>,
}
