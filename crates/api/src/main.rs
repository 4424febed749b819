use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cultura_api::background::sweep;
use cultura_api::config::ServerConfig;
use cultura_api::notifications::WebhookSigningNotifier;
use cultura_api::router::build_app_router;
use cultura_api::state::AppState;
use cultura_core::clock::SystemClock;
use cultura_events::{
    EventBus, EventPersistence, SubscriberRegistry, WebhookDelivery, WebhookSubscriber,
};
use cultura_lifecycle::{Collaborators, GrantStore, LifecycleServices, PgGrantStore, Shared};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cultura_api=debug,cultura_lifecycle=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = cultura_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    cultura_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    cultura_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // Every event is written to the `events` table.
    let persistence_handle = tokio::spawn(EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // Forwarding to the external dispatcher, when configured.
    let mut subscribers = SubscriberRegistry::new();
    if let Some(url) = &config.event_webhook_url {
        subscribers.register(Arc::new(WebhookSubscriber::new(
            url.clone(),
            WebhookDelivery::new(),
        )));
        tracing::info!(url = %url, "Event webhook forwarding enabled");
    }
    let subscribers_handle = tokio::spawn(subscribers.run(event_bus.subscribe()));

    tracing::info!("Event services started (persistence, subscribers)");

    // --- Lifecycle services ---
    let store: Arc<dyn GrantStore> = Arc::new(PgGrantStore::new(pool.clone()));
    let mut collaborators = Collaborators::local(store.clone(), config.artifacts_dir.clone());
    if let Some(url) = &config.signing_webhook_url {
        collaborators = collaborators.with_notifier(Arc::new(WebhookSigningNotifier::new(
            url.clone(),
            WebhookDelivery::new(),
        )));
        tracing::info!(url = %url, "Signing notices go to the dispatcher webhook");
    }
    let shared = Shared::new(
        store,
        Arc::clone(&event_bus),
        Arc::new(SystemClock),
        config.lifecycle.clone(),
    );
    let services = Arc::new(LifecycleServices::new(shared, collaborators));

    // --- Lifecycle sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(sweep::run(
        Arc::clone(&services),
        Duration::from_secs(config.sweep_interval_secs),
        sweep_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        services,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Peer addresses feed the signer IP fallback.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(grace, sweep_handle).await;
    tracing::info!("Lifecycle sweep stopped");

    // The services hold the last bus handles through the router state,
    // which `serve` has dropped by now. Dropping ours closes the channel
    // and lets persistence and subscribers drain and exit.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, persistence_handle).await;
    let _ = tokio::time::timeout(grace, subscribers_handle).await;
    tracing::info!("Event services shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
