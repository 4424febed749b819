//! Repository for the `events` and `event_types` tables.

use cultura_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::event::{Event, EventType};

const EVENT_TYPE_COLUMNS: &str = "id, name, category, is_critical, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, event_type_id, subject_kind, subject_id, actor_id, payload, occurred_at, created_at";

/// Provides read/write operations for events and event types.
pub struct EventRepo;

impl EventRepo {
    /// Find an event type by its dot-separated name (e.g. `"contract.signed"`).
    pub async fn get_event_type_by_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Option<EventType>, sqlx::Error> {
        let query = format!("SELECT {EVENT_TYPE_COLUMNS} FROM event_types WHERE name = $1");
        sqlx::query_as::<_, EventType>(&query)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Insert a new event row, returning the generated ID.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        event_type_id: DbId,
        subject_kind: Option<&str>,
        subject_id: Option<DbId>,
        actor_id: Option<DbId>,
        payload: &serde_json::Value,
        occurred_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events \
                (event_type_id, subject_kind, subject_id, actor_id, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(event_type_id)
        .bind(subject_kind)
        .bind(subject_id)
        .bind(actor_id)
        .bind(payload)
        .bind(occurred_at)
        .fetch_one(executor)
        .await
    }

    /// Events recorded for one subject, oldest first.
    pub async fn list_for_subject<'e, E: PgExecutor<'e>>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE subject_kind = $1 AND subject_id = $2 \
             ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(subject_kind)
            .bind(subject_id)
            .fetch_all(executor)
            .await
    }
}
