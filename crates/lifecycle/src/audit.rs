//! Append-only audit capture.
//!
//! State changes hand an [`AuditDraft`] to the store so the entry commits in
//! the same unit of work as the row. [`AuditRecorder::record`] covers the
//! entries that describe something other than a row change (integrity
//! alerts, reconciliation needs).

use std::sync::Arc;

use cultura_core::audit::{snapshot, subjects};
use cultura_core::capability::Caller;
use cultura_core::clock::Clock;
use cultura_core::context::RequestContext;
use cultura_core::error::CoreError;
use cultura_core::types::DbId;
use cultura_db::models::audit::{AuditEvent, NewAuditEvent};
use serde::Serialize;

use crate::store::{AuditDraft, GrantStore};

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn GrantStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Audit metadata for a store command, with `before` snapshotted now.
    pub fn draft<T: Serialize>(
        &self,
        actor_id: Option<DbId>,
        ctx: &RequestContext,
        action: &'static str,
        before: Option<&T>,
    ) -> Result<AuditDraft, CoreError> {
        Ok(AuditDraft {
            actor_id,
            action,
            before: before.map(snapshot).transpose()?,
            context: ctx.clone(),
            occurred_at: self.clock.now(),
        })
    }

    /// Append a standalone entry. Fails when the store does.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        actor_id: Option<DbId>,
        action: &str,
        subject_kind: &str,
        subject_id: DbId,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
        ctx: &RequestContext,
    ) -> Result<AuditEvent, CoreError> {
        let entry = NewAuditEvent {
            actor_id,
            action: action.to_string(),
            subject_kind: subject_kind.to_string(),
            subject_id,
            before_snapshot: before,
            after_snapshot: after,
            ip_address: ctx.ip.clone(),
            user_agent: ctx.user_agent.clone(),
            occurred_at: self.clock.now(),
        };
        Ok(self.store.append_audit(&entry).await?)
    }

    /// The trail of one subject, oldest first. Back-office callers only.
    pub async fn trail(
        &self,
        caller: &Caller,
        subject_kind: &str,
        subject_id: DbId,
    ) -> Result<Vec<AuditEvent>, CoreError> {
        caller.require(caller.capabilities.is_staff(), "read the audit trail")?;
        if !subjects::ALL.contains(&subject_kind) {
            return Err(CoreError::validation(
                "subject_kind",
                format!("must be one of: {}", subjects::ALL.join(", ")),
            ));
        }
        Ok(self.store.list_audit(subject_kind, subject_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use cultura_core::audit::actions;
    use cultura_core::capability::Capabilities;
    use cultura_core::clock::FixedClock;
    use serde_json::json;

    use super::*;
    use crate::store::memory::MemoryStore;

    fn recorder() -> (AuditRecorder, Arc<MemoryStore>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (AuditRecorder::new(store.clone(), clock), store)
    }

    #[tokio::test]
    async fn record_then_read_back() {
        let (audit, _) = recorder();
        let ctx = RequestContext::new("203.0.113.9", Some("Mozilla".into()));
        audit
            .record(
                None,
                actions::INTEGRITY_ALERT,
                subjects::CONTRACT,
                4,
                None,
                Some(json!({"expected": "aa", "actual": "bb"})),
                &ctx,
            )
            .await
            .unwrap();

        let admin = Caller::user(1, Capabilities::all());
        let trail = audit.trail(&admin, subjects::CONTRACT, 4).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, actions::INTEGRITY_ALERT);
        assert_eq!(trail[0].ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn record_fails_when_the_store_is_down() {
        let (audit, store) = recorder();
        store.set_unavailable(true);
        let result = audit
            .record(Some(1), actions::UPDATE, subjects::CALL, 1, None, None, &RequestContext::default())
            .await;
        assert_matches!(result, Err(CoreError::Storage(_)));
    }

    #[tokio::test]
    async fn applicants_cannot_read_the_trail() {
        let (audit, _) = recorder();
        let applicant = Caller::user(9, Capabilities::default()).with_applicant(3);
        assert_matches!(
            audit.trail(&applicant, subjects::PROJECT, 1).await,
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[tokio::test]
    async fn unknown_subject_kind_is_rejected() {
        let (audit, _) = recorder();
        let admin = Caller::user(1, Capabilities::all());
        assert_matches!(
            audit.trail(&admin, "user", 1).await,
            Err(CoreError::Validation { field, .. }) if field == "subject_kind"
        );
    }

    #[test]
    fn draft_snapshots_the_before_state() {
        let (audit, _) = recorder();
        let draft = audit
            .draft(Some(2), &RequestContext::default(), actions::UPDATE, Some(&json!({"token": "x", "title": "A"})))
            .unwrap();
        let before = draft.before.unwrap();
        assert_eq!(before["title"], "A");
        assert_eq!(before["token"], cultura_core::audit::REDACTED);
    }
}
