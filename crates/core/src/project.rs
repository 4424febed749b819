//! Project (projeto) rules: status graph, project codes, submission
//! readiness and the evaluation decision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money;
use crate::status::ProjectStatus;
use crate::types::{DbId, Money};

/// Entity name used in errors and audit records.
pub const ENTITY: &str = "Project";

/// Zero-padded width of the per-call sequence in a project code.
pub const CODE_SEQUENCE_WIDTH: usize = 4;

/// Inclusive grade bounds.
pub const MIN_GRADE: Decimal = Decimal::ZERO;
pub const MAX_GRADE: Decimal = Decimal::TEN;

// ---------------------------------------------------------------------------
// Status graph
// ---------------------------------------------------------------------------

pub fn is_terminal(status: ProjectStatus) -> bool {
    matches!(
        status,
        ProjectStatus::Rejected | ProjectStatus::Finished | ProjectStatus::Cancelled
    )
}

/// Statuses an evaluation may start from.
pub fn is_evaluable(status: ProjectStatus) -> bool {
    matches!(status, ProjectStatus::Submitted | ProjectStatus::UnderReview)
}

/// Whether `from -> to` is an edge of the project status graph.
///
/// `Approved -> InExecution` is listed here but only the contract signing
/// flow is allowed to drive it.
pub fn can_transition(from: ProjectStatus, to: ProjectStatus) -> bool {
    use ProjectStatus::*;
    match (from, to) {
        (Draft, Submitted) => true,
        (Submitted, UnderReview) => true,
        (Submitted | UnderReview, Approved | Rejected) => true,
        (Approved, InExecution) => true,
        (InExecution, Finished) => true,
        (from, Cancelled) => !is_terminal(from),
        _ => false,
    }
}

pub fn ensure_transition(from: ProjectStatus, to: ProjectStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition(ENTITY, from, to))
    }
}

/// Owners edit only drafts.
pub fn owner_can_edit(status: ProjectStatus) -> bool {
    status == ProjectStatus::Draft
}

/// Administrative override reaches every non-terminal status.
pub fn admin_can_edit(status: ProjectStatus) -> bool {
    !is_terminal(status)
}

// ---------------------------------------------------------------------------
// Project code
// ---------------------------------------------------------------------------

/// `{prefix}-{year}-{call_id}-{seq}` with a zero-padded sequence.
///
/// `year` is the calendar year of the call's opening date and `sequence` is
/// scoped to the call, so codes are unique without a global counter.
pub fn format_project_code(prefix: &str, year: i32, call_id: DbId, sequence: i64) -> String {
    format!(
        "{prefix}-{year}-{call_id}-{sequence:0width$}",
        width = CODE_SEQUENCE_WIDTH
    )
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

pub fn validate_requested_amount(amount: Money) -> Result<(), CoreError> {
    money::ensure_positive("requested_amount", amount)
}

pub fn validate_counterpart_amount(amount: Money) -> Result<(), CoreError> {
    money::ensure_non_negative("counterpart_amount", amount)
}

// ---------------------------------------------------------------------------
// Submission readiness
// ---------------------------------------------------------------------------

/// Borrowed view of the narrative fields checked on submission.
#[derive(Debug, Clone, Copy)]
pub struct Narrative<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub objectives: Option<&'a str>,
    pub justification: Option<&'a str>,
    pub methodology: Option<&'a str>,
    pub schedule: &'a serde_json::Value,
    pub budget: &'a serde_json::Value,
}

/// Names of every narrative field that is still empty, in form order.
pub fn missing_narrative_fields(narrative: &Narrative<'_>) -> Vec<String> {
    let text_fields = [
        ("title", Some(narrative.title)),
        ("description", narrative.description),
        ("objectives", narrative.objectives),
        ("justification", narrative.justification),
        ("methodology", narrative.methodology),
    ];

    let mut missing: Vec<String> = text_fields
        .iter()
        .filter(|(_, value)| !matches!(value, Some(v) if !v.trim().is_empty()))
        .map(|(name, _)| (*name).to_string())
        .collect();

    if json_is_empty(narrative.schedule) {
        missing.push("schedule".to_string());
    }
    if json_is_empty(narrative.budget) {
        missing.push("budget".to_string());
    }
    missing
}

/// `null`, blank strings, empty arrays and empty objects count as empty.
pub fn json_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The two outcomes an evaluator can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// The project status this decision lands on.
    pub fn target_status(self) -> ProjectStatus {
        match self {
            Decision::Approved => ProjectStatus::Approved,
            Decision::Rejected => ProjectStatus::Rejected,
        }
    }
}

/// Evaluator input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDecision {
    pub decision: Decision,
    pub approved_amount: Option<Money>,
    pub grade: Option<Decimal>,
    pub technical_opinion: Option<String>,
    pub reason: Option<String>,
}

/// A decision that passed [`validate_decision`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvaluation {
    pub status: ProjectStatus,
    pub approved_amount: Option<Money>,
    pub grade: Option<Decimal>,
    pub technical_opinion: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Check an evaluator decision against the project's requested amount.
///
/// Approvals need `0 < approved_amount <= requested_amount`; rejections need
/// a non-blank reason and carry no amount. Grades, when given, lie in
/// `[0, 10]`.
pub fn validate_decision(
    input: &EvaluationDecision,
    requested_amount: Money,
) -> Result<ValidatedEvaluation, CoreError> {
    if let Some(grade) = input.grade {
        if grade < MIN_GRADE || grade > MAX_GRADE {
            return Err(CoreError::validation("grade", "must be between 0 and 10"));
        }
        if grade.round_dp(2) != grade {
            return Err(CoreError::validation(
                "grade",
                "must have at most two decimal places",
            ));
        }
    }

    let technical_opinion = non_blank(input.technical_opinion.as_deref());

    match input.decision {
        Decision::Approved => {
            let amount = input.approved_amount.ok_or_else(|| {
                CoreError::validation("approved_amount", "is required when approving")
            })?;
            money::ensure_positive("approved_amount", amount)?;
            if amount > requested_amount {
                return Err(CoreError::validation(
                    "approved_amount",
                    format!(
                        "{} exceeds the requested amount {}",
                        money::canonical(amount),
                        money::canonical(requested_amount)
                    ),
                ));
            }
            Ok(ValidatedEvaluation {
                status: ProjectStatus::Approved,
                approved_amount: Some(amount),
                grade: input.grade,
                technical_opinion,
                rejection_reason: None,
            })
        }
        Decision::Rejected => {
            if input.approved_amount.is_some() {
                return Err(CoreError::validation(
                    "approved_amount",
                    "must not be set when rejecting",
                ));
            }
            let reason = non_blank(input.reason.as_deref())
                .ok_or_else(|| CoreError::validation("reason", "is required when rejecting"))?;
            Ok(ValidatedEvaluation {
                status: ProjectStatus::Rejected,
                approved_amount: None,
                grade: input.grade,
                technical_opinion,
                rejection_reason: Some(reason),
            })
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn approve(amount: &str) -> EvaluationDecision {
        EvaluationDecision {
            decision: Decision::Approved,
            approved_amount: Some(dec(amount)),
            grade: Some(dec("8.5")),
            technical_opinion: Some("Solid proposal".into()),
            reason: None,
        }
    }

    #[test]
    fn project_code_is_zero_padded() {
        assert_eq!(format_project_code("PRJ", 2024, 7, 1), "PRJ-2024-7-0001");
        assert_eq!(format_project_code("PRJ", 2024, 7, 12345), "PRJ-2024-7-12345");
    }

    #[test]
    fn in_execution_is_reachable_only_from_approved() {
        use ProjectStatus::*;
        assert!(can_transition(Approved, InExecution));
        assert!(!can_transition(Submitted, InExecution));
        assert!(!can_transition(Draft, InExecution));
    }

    #[test]
    fn evaluation_edges() {
        use ProjectStatus::*;
        assert!(can_transition(Submitted, Approved));
        assert!(can_transition(UnderReview, Rejected));
        assert!(!can_transition(Draft, Approved));
        assert!(!can_transition(Approved, Rejected));
    }

    #[test]
    fn cancellation_from_non_terminal_only() {
        use ProjectStatus::*;
        assert!(can_transition(Draft, Cancelled));
        assert!(can_transition(InExecution, Cancelled));
        assert!(!can_transition(Rejected, Cancelled));
        assert!(!can_transition(Finished, Cancelled));
    }

    #[test]
    fn owner_edits_only_drafts() {
        assert!(owner_can_edit(ProjectStatus::Draft));
        assert!(!owner_can_edit(ProjectStatus::Submitted));
        assert!(admin_can_edit(ProjectStatus::InExecution));
        assert!(!admin_can_edit(ProjectStatus::Finished));
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let empty_schedule = json!([]);
        let budget = json!({"items": [{"label": "rent", "amount": "100.00"}]});
        let narrative = Narrative {
            title: "Teatro na praça",
            description: Some("desc"),
            objectives: None,
            justification: Some("   "),
            methodology: Some("workshops"),
            schedule: &empty_schedule,
            budget: &budget,
        };
        assert_eq!(
            missing_narrative_fields(&narrative),
            vec!["objectives", "justification", "schedule"]
        );
    }

    #[test]
    fn json_emptiness() {
        assert!(json_is_empty(&json!(null)));
        assert!(json_is_empty(&json!("")));
        assert!(json_is_empty(&json!({})));
        assert!(!json_is_empty(&json!(0)));
        assert!(!json_is_empty(&json!(["week 1"])));
    }

    #[test]
    fn approval_within_requested_amount() {
        let result = validate_decision(&approve("8000"), dec("10000")).unwrap();
        assert_eq!(result.status, ProjectStatus::Approved);
        assert_eq!(result.approved_amount, Some(dec("8000")));
        assert_eq!(result.rejection_reason, None);
    }

    #[test]
    fn approval_above_requested_amount_is_rejected() {
        assert_matches!(
            validate_decision(&approve("15000"), dec("10000")),
            Err(CoreError::Validation { field, .. }) if field == "approved_amount"
        );
    }

    #[test]
    fn approval_requires_positive_amount() {
        assert!(validate_decision(&approve("0"), dec("10000")).is_err());
        let mut no_amount = approve("1");
        no_amount.approved_amount = None;
        assert!(validate_decision(&no_amount, dec("10000")).is_err());
    }

    #[test]
    fn grade_must_be_in_range() {
        let mut input = approve("100");
        input.grade = Some(dec("10.5"));
        assert_matches!(
            validate_decision(&input, dec("10000")),
            Err(CoreError::Validation { field, .. }) if field == "grade"
        );
        input.grade = Some(dec("10"));
        assert!(validate_decision(&input, dec("10000")).is_ok());
    }

    #[test]
    fn rejection_requires_reason() {
        let input = EvaluationDecision {
            decision: Decision::Rejected,
            approved_amount: None,
            grade: None,
            technical_opinion: None,
            reason: Some("  ".into()),
        };
        assert_matches!(
            validate_decision(&input, dec("10000")),
            Err(CoreError::Validation { field, .. }) if field == "reason"
        );
    }

    #[test]
    fn rejection_carries_no_amount() {
        let input = EvaluationDecision {
            decision: Decision::Rejected,
            approved_amount: Some(dec("10")),
            grade: None,
            technical_opinion: None,
            reason: Some("Out of scope".into()),
        };
        assert!(validate_decision(&input, dec("10000")).is_err());

        let ok = EvaluationDecision {
            approved_amount: None,
            ..input
        };
        let result = validate_decision(&ok, dec("10000")).unwrap();
        assert_eq!(result.status, ProjectStatus::Rejected);
        assert_eq!(result.rejection_reason.as_deref(), Some("Out of scope"));
    }
}
