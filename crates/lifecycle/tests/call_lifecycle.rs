mod common;

use assert_matches::assert_matches;
use common::{admin, ctx, ts, Harness};
use cultura_core::audit::actions;
use cultura_core::capability::{Caller, Capabilities};
use cultura_core::error::CoreError;
use cultura_core::status::CallStatus;
use cultura_db::models::call::{CallFilter, UpdateCall};
use cultura_events::names;

#[tokio::test]
async fn create_starts_in_draft_and_announces_it() {
    let mut h = Harness::new();
    let call = h
        .services
        .calls
        .create(&admin(), &ctx(), h.call_input(&[" portfolio ", "portfolio"]))
        .await
        .unwrap();

    assert_eq!(call.status, CallStatus::Draft);
    assert_eq!(call.created_by, Some(1));
    assert_eq!(call.required_document_categories, vec!["portfolio".to_string()]);
    assert_eq!(h.event_types(), vec![names::CALL_CREATED.to_string()]);

    let trail = h.services.audit.trail(&admin(), "call", call.id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, actions::CREATE);
    assert_eq!(trail[0].ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn window_must_open_before_it_closes() {
    let h = Harness::new();
    let mut input = h.call_input(&[]);
    input.close_at = input.open_at;

    assert_matches!(
        h.services.calls.create(&admin(), &ctx(), input).await,
        Err(CoreError::Validation { field, .. }) if field == "close_at"
    );
}

#[tokio::test]
async fn only_call_managers_create_calls() {
    let h = Harness::new();
    let evaluator = Caller::user(5, Capabilities::for_role("evaluator"));

    assert_matches!(
        h.services.calls.create(&evaluator, &ctx(), h.call_input(&[])).await,
        Err(CoreError::PermissionDenied(_))
    );
}

#[tokio::test]
async fn transitions_follow_the_call_graph() {
    let mut h = Harness::new();
    let call = h
        .services
        .calls
        .create(&admin(), &ctx(), h.call_input(&[]))
        .await
        .unwrap();

    assert_matches!(
        h.services
            .calls
            .transition(&admin(), &ctx(), call.id, CallStatus::Finished)
            .await,
        Err(CoreError::InvalidTransition { from, to, .. }) if from == "draft" && to == "finished"
    );

    let calls = &h.services.calls;
    calls
        .transition(&admin(), &ctx(), call.id, CallStatus::Published)
        .await
        .unwrap();
    calls
        .transition(&admin(), &ctx(), call.id, CallStatus::Ongoing)
        .await
        .unwrap();
    let finished = calls
        .transition(&admin(), &ctx(), call.id, CallStatus::Finished)
        .await
        .unwrap();
    assert_eq!(finished.status, CallStatus::Finished);

    assert_matches!(
        calls
            .transition(&admin(), &ctx(), call.id, CallStatus::Cancelled)
            .await,
        Err(CoreError::InvalidTransition { .. })
    );

    let types = h.event_types();
    assert_eq!(
        types,
        vec![
            names::CALL_CREATED,
            names::CALL_PUBLISHED,
            names::CALL_ONGOING,
            names::CALL_FINISHED
        ]
    );
}

#[tokio::test]
async fn terminal_calls_cannot_be_edited() {
    let h = Harness::new();
    let call = h.published_call(&[]).await;
    h.services
        .calls
        .transition(&admin(), &ctx(), call.id, CallStatus::Cancelled)
        .await
        .unwrap();

    let patch = UpdateCall {
        title: Some("Novo título".into()),
        ..Default::default()
    };
    assert_matches!(
        h.services.calls.update(&admin(), &ctx(), call.id, patch).await,
        Err(CoreError::Conflict(_))
    );
}

#[tokio::test]
async fn edits_validate_the_merged_window() {
    let h = Harness::new();
    let call = h.published_call(&[]).await;

    let bad = UpdateCall {
        close_at: Some(ts(2023, 12, 1, 0, 0, 0)),
        ..Default::default()
    };
    assert_matches!(
        h.services.calls.update(&admin(), &ctx(), call.id, bad).await,
        Err(CoreError::Validation { field, .. }) if field == "close_at"
    );

    let extended = UpdateCall {
        close_at: Some(ts(2024, 2, 15, 23, 59, 59)),
        ..Default::default()
    };
    let updated = h
        .services
        .calls
        .update(&admin(), &ctx(), call.id, extended)
        .await
        .unwrap();
    assert_eq!(updated.close_at, ts(2024, 2, 15, 23, 59, 59));
    assert_eq!(updated.status, CallStatus::Published);
}

#[tokio::test]
async fn close_expired_is_idempotent() {
    let mut h = Harness::new();
    let first = h.published_call(&[]).await;
    let second = h.published_call(&[]).await;
    h.services
        .calls
        .transition(&admin(), &ctx(), second.id, CallStatus::Ongoing)
        .await
        .unwrap();
    let untouched = h
        .services
        .calls
        .create(&admin(), &ctx(), h.call_input(&[]))
        .await
        .unwrap();
    h.drain_events();

    h.clock.set(ts(2024, 2, 2, 3, 0, 0));
    let closed = h
        .services
        .calls
        .close_expired(&Caller::system(), &ctx())
        .await
        .unwrap();
    let mut closed_ids: Vec<_> = closed.iter().map(|c| c.id).collect();
    closed_ids.sort();
    assert_eq!(closed_ids, vec![first.id, second.id]);
    assert_eq!(
        h.event_types(),
        vec![names::CALL_FINISHED.to_string(), names::CALL_FINISHED.to_string()]
    );

    let again = h
        .services
        .calls
        .close_expired(&Caller::system(), &ctx())
        .await
        .unwrap();
    assert!(again.is_empty());
    assert!(h.drain_events().is_empty());

    let draft = h.services.calls.get(untouched.id).await.unwrap();
    assert_eq!(draft.status, CallStatus::Draft);

    let trail = h.services.audit.trail(&admin(), "call", first.id).await.unwrap();
    let sweep: Vec<_> = trail
        .iter()
        .filter(|e| e.action == actions::CLOSE_EXPIRED)
        .collect();
    assert_eq!(sweep.len(), 1);
    assert_eq!(sweep[0].actor_id, None);
}

#[tokio::test]
async fn calls_with_projects_cannot_be_deleted() {
    let mut h = Harness::new();
    let call = h.published_call(&[]).await;
    let (owner, caller) = h.applicant().await;
    h.draft_project(&call, &owner, &caller).await;

    assert_matches!(
        h.services.calls.delete(&admin(), &ctx(), call.id).await,
        Err(CoreError::Conflict(_))
    );

    let empty = h
        .services
        .calls
        .create(&admin(), &ctx(), h.call_input(&[]))
        .await
        .unwrap();
    h.services.calls.delete(&admin(), &ctx(), empty.id).await.unwrap();
    assert_matches!(
        h.services.calls.get(empty.id).await,
        Err(CoreError::NotFound { entity: "Call", .. })
    );
}

#[tokio::test]
async fn list_filters_by_status() {
    let h = Harness::new();
    h.published_call(&[]).await;
    h.services
        .calls
        .create(&admin(), &ctx(), h.call_input(&[]))
        .await
        .unwrap();

    let published = h
        .services
        .calls
        .list(&CallFilter {
            status: Some(CallStatus::Published),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].status, CallStatus::Published);
}
