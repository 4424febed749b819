use std::path::PathBuf;

use cultura_core::config::LifecycleConfig;

use crate::auth::jwt::JwtConfig;

/// Default interval between lifecycle sweeps (one day).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for each background task (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Directory receiving rendered contract artifacts (default: `./artifacts`).
    pub artifacts_dir: PathBuf,
    /// Where lifecycle events are forwarded. Unset disables forwarding.
    pub event_webhook_url: Option<String>,
    /// Where signing notices are posted. Unset means notices are only logged.
    pub signing_webhook_url: Option<String>,
    /// Seconds between lifecycle sweeps (default: one day).
    pub sweep_interval_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Tunables handed to the lifecycle services.
    pub lifecycle: LifecycleConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `ARTIFACTS_DIR`            | `./artifacts`              |
    /// | `EVENT_WEBHOOK_URL`        | unset                      |
    /// | `SIGNING_WEBHOOK_URL`      | unset                      |
    /// | `SWEEP_INTERVAL_SECS`      | `86400`                    |
    ///
    /// JWT and lifecycle settings are read by [`JwtConfig::from_env`] and
    /// [`LifecycleConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let artifacts_dir = std::env::var("ARTIFACTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./artifacts"));

        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .expect("SWEEP_INTERVAL_SECS must be a valid u64");
        assert!(
            sweep_interval_secs > 0,
            "SWEEP_INTERVAL_SECS must be greater than zero"
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            artifacts_dir,
            event_webhook_url: non_empty_var("EVENT_WEBHOOK_URL"),
            signing_webhook_url: non_empty_var("SIGNING_WEBHOOK_URL"),
            sweep_interval_secs,
            jwt: JwtConfig::from_env(),
            lifecycle: LifecycleConfig::from_env(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
