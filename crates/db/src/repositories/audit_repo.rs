//! Repository for the append-only `audit_events` table.

use cultura_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::audit::{AuditEvent, NewAuditEvent};

const COLUMNS: &str = "\
    id, actor_id, action, subject_kind, subject_id, before_snapshot, \
    after_snapshot, ip_address, user_agent, occurred_at, created_at";

/// Insert and read operations for audit entries. There is no update or
/// delete; the table rejects both.
pub struct AuditEventRepo;

impl AuditEventRepo {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        entry: &NewAuditEvent,
    ) -> Result<AuditEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_events \
                (actor_id, action, subject_kind, subject_id, before_snapshot, \
                 after_snapshot, ip_address, user_agent, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(entry.actor_id)
            .bind(&entry.action)
            .bind(&entry.subject_kind)
            .bind(entry.subject_id)
            .bind(&entry.before_snapshot)
            .bind(&entry.after_snapshot)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.occurred_at)
            .fetch_one(executor)
            .await
    }

    /// The trail of one subject, oldest first.
    pub async fn list_for_subject<'e, E: PgExecutor<'e>>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_events \
             WHERE subject_kind = $1 AND subject_id = $2 \
             ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(subject_kind)
            .bind(subject_id)
            .fetch_all(executor)
            .await
    }
}
