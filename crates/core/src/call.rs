//! Funding call (edital) rules: status graph and the submission window.
//!
//! Everything here is pure; persistence and event emission happen in the
//! lifecycle crate.

use crate::error::CoreError;
use crate::money;
use crate::status::CallStatus;
use crate::types::{DbId, Money, Timestamp};

/// Entity name used in errors and audit records.
pub const ENTITY: &str = "Call";

/// Maximum title length.
pub const MAX_TITLE_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Status graph
// ---------------------------------------------------------------------------

/// Finished and cancelled calls accept no further transitions.
pub fn is_terminal(status: CallStatus) -> bool {
    matches!(status, CallStatus::Finished | CallStatus::Cancelled)
}

/// Statuses in which projects may be created and submitted.
pub fn is_accepting(status: CallStatus) -> bool {
    matches!(status, CallStatus::Published | CallStatus::Ongoing)
}

/// Whether `from -> to` is an edge of the call status graph.
pub fn can_transition(from: CallStatus, to: CallStatus) -> bool {
    use CallStatus::*;
    match (from, to) {
        (Draft, Published) => true,
        (Published, Ongoing) => true,
        (Published | Ongoing, Finished) => true,
        (from, Cancelled) => !is_terminal(from),
        _ => false,
    }
}

/// Reject edges outside the graph with [`CoreError::InvalidTransition`].
pub fn ensure_transition(from: CallStatus, to: CallStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition(ENTITY, from, to))
    }
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("title", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::validation(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

/// `open_at < close_at`, and the result date (when set) is not before closing.
pub fn validate_window(
    open_at: Timestamp,
    close_at: Timestamp,
    result_at: Option<Timestamp>,
) -> Result<(), CoreError> {
    if open_at >= close_at {
        return Err(CoreError::validation(
            "close_at",
            "must be later than open_at",
        ));
    }
    if let Some(result_at) = result_at {
        if result_at < close_at {
            return Err(CoreError::validation(
                "result_at",
                "must not be earlier than close_at",
            ));
        }
    }
    Ok(())
}

pub fn validate_budget(total_budget: Money) -> Result<(), CoreError> {
    money::ensure_non_negative("total_budget", total_budget)
}

// ---------------------------------------------------------------------------
// Submission window
// ---------------------------------------------------------------------------

/// Fail unless the call is accepting projects at `now`.
///
/// The window is inclusive on both ends: `open_at <= now <= close_at`. It is
/// checked before the status so a late submission reports the window whether
/// or not the expiry sweep has already finished the call.
pub fn ensure_accepting_submissions(
    call_id: DbId,
    status: CallStatus,
    open_at: Timestamp,
    close_at: Timestamp,
    now: Timestamp,
) -> Result<(), CoreError> {
    if now < open_at || now > close_at {
        return Err(CoreError::OutsideSubmissionWindow {
            call_id,
            open_at,
            close_at,
            at: now,
        });
    }
    if !is_accepting(status) {
        return Err(CoreError::validation(
            "call_id",
            format!("call {call_id} is '{status}'; submissions require a published or ongoing call"),
        ));
    }
    Ok(())
}

/// A call the daily sweep should finish.
pub fn is_expired(status: CallStatus, close_at: Timestamp, now: Timestamp) -> bool {
    is_accepting(status) && close_at < now
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn allowed_edges() {
        use CallStatus::*;
        assert!(can_transition(Draft, Published));
        assert!(can_transition(Published, Ongoing));
        assert!(can_transition(Published, Finished));
        assert!(can_transition(Ongoing, Finished));
        assert!(can_transition(Draft, Cancelled));
        assert!(can_transition(Ongoing, Cancelled));
    }

    #[test]
    fn rejected_edges() {
        use CallStatus::*;
        assert!(!can_transition(Draft, Ongoing));
        assert!(!can_transition(Draft, Finished));
        assert!(!can_transition(Ongoing, Published));
        assert!(!can_transition(Finished, Cancelled));
        assert!(!can_transition(Cancelled, Cancelled));
        assert!(!can_transition(Finished, Published));
    }

    #[test]
    fn ensure_transition_names_both_statuses() {
        assert_matches!(
            ensure_transition(CallStatus::Finished, CallStatus::Published),
            Err(CoreError::InvalidTransition { entity: "Call", from, to })
                if from == "finished" && to == "published"
        );
    }

    #[test]
    fn window_must_be_ordered() {
        assert!(validate_window(at(2024, 1, 1), at(2024, 1, 31), None).is_ok());
        assert!(validate_window(at(2024, 1, 31), at(2024, 1, 1), None).is_err());
        assert!(validate_window(at(2024, 1, 1), at(2024, 1, 1), None).is_err());
        assert_matches!(
            validate_window(at(2024, 1, 1), at(2024, 1, 31), Some(at(2024, 1, 15))),
            Err(CoreError::Validation { field, .. }) if field == "result_at"
        );
    }

    #[test]
    fn submission_window_is_inclusive() {
        let open = at(2024, 1, 1);
        let close = at(2024, 1, 31);
        assert!(ensure_accepting_submissions(1, CallStatus::Published, open, close, open).is_ok());
        assert!(ensure_accepting_submissions(1, CallStatus::Ongoing, open, close, close).is_ok());
    }

    #[test]
    fn submission_after_close_is_outside_window() {
        assert_matches!(
            ensure_accepting_submissions(
                7,
                CallStatus::Published,
                at(2024, 1, 1),
                at(2024, 1, 31),
                at(2024, 2, 1),
            ),
            Err(CoreError::OutsideSubmissionWindow { call_id: 7, .. })
        );
    }

    #[test]
    fn draft_call_does_not_accept_submissions() {
        assert_matches!(
            ensure_accepting_submissions(
                7,
                CallStatus::Draft,
                at(2024, 1, 1),
                at(2024, 1, 31),
                at(2024, 1, 10),
            ),
            Err(CoreError::Validation { field, .. }) if field == "call_id"
        );
    }

    #[test]
    fn late_submission_reports_window_even_after_sweep() {
        assert_matches!(
            ensure_accepting_submissions(
                7,
                CallStatus::Finished,
                at(2024, 1, 1),
                at(2024, 1, 31),
                at(2024, 2, 1),
            ),
            Err(CoreError::OutsideSubmissionWindow { call_id: 7, .. })
        );
    }

    #[test]
    fn expiry_only_applies_to_open_calls() {
        let close = at(2024, 1, 31);
        let now = at(2024, 2, 1);
        assert!(is_expired(CallStatus::Published, close, now));
        assert!(is_expired(CallStatus::Ongoing, close, now));
        assert!(!is_expired(CallStatus::Draft, close, now));
        assert!(!is_expired(CallStatus::Finished, close, now));
        assert!(!is_expired(CallStatus::Published, close, at(2024, 1, 30)));
    }

    #[test]
    fn title_is_required() {
        assert!(validate_title("  ").is_err());
        assert!(validate_title(&"x".repeat(256)).is_err());
        assert!(validate_title("Edital de Teatro 2024").is_ok());
    }
}
