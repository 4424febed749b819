//! Periodic lifecycle housekeeping.
//!
//! Each tick closes calls whose submission window has passed and expires
//! contracts whose validity has ended, both as the system caller. Both
//! operations are idempotent, so a missed or repeated tick is harmless.

use std::sync::Arc;
use std::time::Duration;

use cultura_core::capability::Caller;
use cultura_core::context::RequestContext;
use cultura_lifecycle::LifecycleServices;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
///
/// The first tick fires immediately, so anything that lapsed while the
/// server was down is handled at startup.
pub async fn run(services: Arc<LifecycleServices>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Lifecycle sweep job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lifecycle sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                sweep_once(&services).await;
            }
        }
    }
}

/// One sweep. Failures are logged; the next tick retries.
pub async fn sweep_once(services: &LifecycleServices) {
    let system = Caller::system();
    let ctx = RequestContext::default();

    match services.calls.close_expired(&system, &ctx).await {
        Ok(closed) if closed.is_empty() => {
            tracing::debug!("Lifecycle sweep: no calls to close");
        }
        Ok(closed) => {
            tracing::info!(closed = closed.len(), "Lifecycle sweep: closed expired calls");
        }
        Err(e) => {
            tracing::error!(error = %e, "Lifecycle sweep: closing calls failed");
        }
    }

    match services.contracts.expire_lapsed(&system, &ctx, None).await {
        Ok(expired) if expired.is_empty() => {
            tracing::debug!("Lifecycle sweep: no contracts to expire");
        }
        Ok(expired) => {
            tracing::info!(expired = expired.len(), "Lifecycle sweep: expired lapsed contracts");
        }
        Err(e) => {
            tracing::error!(error = %e, "Lifecycle sweep: expiring contracts failed");
        }
    }
}
