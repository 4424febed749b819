//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`LifecycleEvent`] to the `events` table. It
//! runs as a background task and exits when the bus is dropped.

use cultura_core::types::DbId;
use cultura_db::repositories::EventRepo;
use cultura_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::LifecycleEvent;

/// Background service that persists lifecycle events to the database.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<LifecycleEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Resolve the event type id and insert the row.
    async fn persist(pool: &DbPool, event: &LifecycleEvent) -> Result<DbId, sqlx::Error> {
        let event_type = EventRepo::get_event_type_by_name(pool, &event.event_type)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        EventRepo::insert(
            pool,
            event_type.id,
            event.subject_kind.as_deref(),
            event.subject_id,
            event.actor_id,
            &event.payload,
            event.occurred_at,
        )
        .await
    }
}
