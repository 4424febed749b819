//! Funding call (edital) lifecycle.
//!
//! Owns every write to calls: creation, edits while the call is open,
//! status moves along the call graph and the expiry sweep that finishes
//! calls whose submission window has closed.

use cultura_core::audit::{actions, subjects};
use cultura_core::call;
use cultura_core::capability::Caller;
use cultura_core::context::RequestContext;
use cultura_core::error::CoreError;
use cultura_core::status::CallStatus;
use cultura_core::types::DbId;
use cultura_db::models::call::{Call, CallFilter, CreateCall, UpdateCall};
use cultura_events::names;
use serde_json::json;

use crate::services::Shared;
use crate::store::StoreError;

/// Statuses in which a call can still be edited.
const EDITABLE: [CallStatus; 3] = [CallStatus::Draft, CallStatus::Published, CallStatus::Ongoing];

/// Statuses the expiry sweep finishes.
const SWEEPABLE: [CallStatus; 2] = [CallStatus::Published, CallStatus::Ongoing];

#[derive(Clone)]
pub struct CallLifecycle {
    shared: Shared,
}

impl CallLifecycle {
    pub fn new(shared: Shared) -> Self {
        Self { shared }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Create a call in `draft`.
    pub async fn create(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        input: CreateCall,
    ) -> Result<Call, CoreError> {
        caller.require(caller.capabilities.manage_calls, "create calls")?;
        call::validate_title(&input.title)?;
        call::validate_window(input.open_at, input.close_at, input.result_at)?;
        call::validate_budget(input.total_budget)?;

        let input = CreateCall {
            title: input.title.trim().to_string(),
            required_document_categories: normalize_categories(input.required_document_categories),
            ..input
        };

        let audit = self.shared.draft::<Call>(caller, ctx, actions::CREATE, None)?;
        let created = self
            .shared
            .store
            .insert_call(&input, caller.user_id, audit)
            .await?;

        tracing::info!(call_id = created.id, title = %created.title, "Call created");
        self.shared.emit(
            names::CALL_CREATED,
            subjects::CALL,
            created.id,
            caller.user_id,
            json!({
                "title": created.title,
                "open_at": created.open_at,
                "close_at": created.close_at,
            }),
        );
        Ok(created)
    }

    /// Patch a call that is not finished or cancelled.
    pub async fn update(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        mut patch: UpdateCall,
    ) -> Result<Call, CoreError> {
        caller.require(caller.capabilities.manage_calls, "edit calls")?;
        let current = self.load(id).await?;
        if call::is_terminal(current.status) {
            return Err(CoreError::Conflict(format!(
                "call {id} is '{}' and can no longer be edited",
                current.status
            )));
        }

        if let Some(title) = &patch.title {
            call::validate_title(title)?;
        }
        if patch.open_at.is_some() || patch.close_at.is_some() || patch.result_at.is_some() {
            call::validate_window(
                patch.open_at.unwrap_or(current.open_at),
                patch.close_at.unwrap_or(current.close_at),
                patch.result_at.or(current.result_at),
            )?;
        }
        if let Some(budget) = patch.total_budget {
            call::validate_budget(budget)?;
        }
        patch.required_document_categories = patch
            .required_document_categories
            .take()
            .map(normalize_categories);

        let audit = self
            .shared
            .draft(caller, ctx, actions::UPDATE, Some(&current))?;
        let updated = self
            .shared
            .store
            .update_call(id, &EDITABLE, &patch, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!("call {id} changed status during the edit"))
            })?;

        tracing::info!(call_id = id, "Call updated");
        self.shared.emit(
            names::CALL_UPDATED,
            subjects::CALL,
            id,
            caller.user_id,
            json!({ "title": updated.title }),
        );
        Ok(updated)
    }

    /// Move a call along its status graph.
    pub async fn transition(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        target: CallStatus,
    ) -> Result<Call, CoreError> {
        caller.require(caller.capabilities.manage_calls, "change call status")?;
        let current = self.load(id).await?;
        call::ensure_transition(current.status, target)?;

        let audit = self
            .shared
            .draft(caller, ctx, actions::TRANSITION, Some(&current))?;
        let moved = self
            .shared
            .store
            .transition_call(id, &[current.status], target, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!(
                    "call {id} left status '{}' before the move to '{target}'",
                    current.status
                ))
            })?;

        tracing::info!(call_id = id, from = %current.status, to = %target, "Call transitioned");
        self.shared.emit(
            transition_event(target),
            subjects::CALL,
            id,
            caller.user_id,
            json!({ "from": current.status, "to": target, "title": moved.title }),
        );
        Ok(moved)
    }

    /// Delete a call no project refers to.
    pub async fn delete(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<(), CoreError> {
        caller.require(caller.capabilities.manage_calls, "delete calls")?;
        let current = self.load(id).await?;

        let audit = self
            .shared
            .draft(caller, ctx, actions::DELETE, Some(&current))?;
        let deleted = match self.shared.store.delete_call(id, audit).await {
            Ok(deleted) => deleted,
            Err(StoreError::Referenced(_)) => {
                return Err(CoreError::Conflict(format!(
                    "call {id} has projects and cannot be deleted"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if !deleted {
            return Err(CoreError::NotFound {
                entity: call::ENTITY,
                id,
            });
        }

        tracing::info!(call_id = id, "Call deleted");
        self.shared.emit(
            names::CALL_DELETED,
            subjects::CALL,
            id,
            caller.user_id,
            json!({ "title": current.title }),
        );
        Ok(())
    }

    /// Finish every published or ongoing call whose window has closed.
    ///
    /// Each call moves with its own compare-and-swap, so a call finished by a
    /// concurrent sweep (or by hand) is skipped without an audit entry or
    /// event. Returns the calls this run finished.
    pub async fn close_expired(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
    ) -> Result<Vec<Call>, CoreError> {
        caller.require(caller.capabilities.manage_calls, "close expired calls")?;
        let now = self.shared.now();
        let candidates = self.shared.store.list_expired_calls(now).await?;

        let mut closed = Vec::new();
        for candidate in candidates {
            let audit = self
                .shared
                .draft(caller, ctx, actions::CLOSE_EXPIRED, Some(&candidate))?;
            let Some(finished) = self
                .shared
                .store
                .transition_call(candidate.id, &SWEEPABLE, CallStatus::Finished, audit)
                .await?
            else {
                tracing::debug!(call_id = candidate.id, "Call already left the open statuses");
                continue;
            };

            tracing::info!(
                call_id = finished.id,
                close_at = %finished.close_at,
                "Call finished by expiry sweep"
            );
            self.shared.emit(
                names::CALL_FINISHED,
                subjects::CALL,
                finished.id,
                caller.user_id,
                json!({
                    "from": candidate.status,
                    "to": CallStatus::Finished,
                    "title": finished.title,
                    "reason": "submission window closed",
                }),
            );
            closed.push(finished);
        }
        Ok(closed)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get(&self, id: DbId) -> Result<Call, CoreError> {
        self.load(id).await
    }

    pub async fn list(&self, filter: &CallFilter) -> Result<Vec<Call>, CoreError> {
        Ok(self.shared.store.list_calls(filter).await?)
    }

    async fn load(&self, id: DbId) -> Result<Call, CoreError> {
        self.shared
            .store
            .find_call(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: call::ENTITY,
                id,
            })
    }
}

fn transition_event(target: CallStatus) -> &'static str {
    match target {
        CallStatus::Published => names::CALL_PUBLISHED,
        CallStatus::Ongoing => names::CALL_ONGOING,
        CallStatus::Finished => names::CALL_FINISHED,
        CallStatus::Cancelled => names::CALL_CANCELLED,
        CallStatus::Draft => names::CALL_UPDATED,
    }
}

/// Trimmed, non-empty, deduplicated, in first-seen order.
fn normalize_categories(categories: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        let trimmed = category.trim();
        if !trimmed.is_empty() && !out.iter().any(|c| c == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_trimmed_and_deduplicated() {
        let out = normalize_categories(vec![
            " budget_sheet ".into(),
            "".into(),
            "portfolio".into(),
            "budget_sheet".into(),
        ]);
        assert_eq!(out, vec!["budget_sheet".to_string(), "portfolio".to_string()]);
    }

    #[test]
    fn every_target_maps_to_an_event() {
        assert_eq!(transition_event(CallStatus::Published), names::CALL_PUBLISHED);
        assert_eq!(transition_event(CallStatus::Cancelled), names::CALL_CANCELLED);
    }
}
