//! Event type names. Each one is seeded into the `event_types` table.

pub const CALL_CREATED: &str = "call.created";
pub const CALL_UPDATED: &str = "call.updated";
pub const CALL_PUBLISHED: &str = "call.published";
pub const CALL_ONGOING: &str = "call.ongoing";
pub const CALL_FINISHED: &str = "call.finished";
pub const CALL_CANCELLED: &str = "call.cancelled";
pub const CALL_DELETED: &str = "call.deleted";

pub const APPLICANT_REGISTERED: &str = "applicant.registered";
pub const APPLICANT_UPDATED: &str = "applicant.updated";

pub const PROJECT_CREATED: &str = "project.created";
pub const PROJECT_UPDATED: &str = "project.updated";
pub const PROJECT_SUBMITTED: &str = "project.submitted";
pub const PROJECT_REVIEW_STARTED: &str = "project.review_started";
pub const PROJECT_EVALUATED: &str = "project.evaluated";
pub const PROJECT_CANCELLED: &str = "project.cancelled";
pub const PROJECT_IN_EXECUTION: &str = "project.in_execution";
pub const PROJECT_FINISHED: &str = "project.finished";

pub const CONTRACT_CREATED: &str = "contract.created";
pub const CONTRACT_UPDATED: &str = "contract.updated";
pub const CONTRACT_SENT: &str = "contract.sent";
pub const CONTRACT_SIGNED: &str = "contract.signed";
pub const CONTRACT_TERMINATED: &str = "contract.terminated";
pub const CONTRACT_EXPIRED: &str = "contract.expired";
pub const CONTRACT_INTEGRITY_ALERT: &str = "contract.integrity_alert";
pub const CONTRACT_RECONCILIATION_REQUIRED: &str = "contract.reconciliation_required";

/// Every known event type.
pub const ALL: &[&str] = &[
    CALL_CREATED,
    CALL_UPDATED,
    CALL_PUBLISHED,
    CALL_ONGOING,
    CALL_FINISHED,
    CALL_CANCELLED,
    CALL_DELETED,
    APPLICANT_REGISTERED,
    APPLICANT_UPDATED,
    PROJECT_CREATED,
    PROJECT_UPDATED,
    PROJECT_SUBMITTED,
    PROJECT_REVIEW_STARTED,
    PROJECT_EVALUATED,
    PROJECT_CANCELLED,
    PROJECT_IN_EXECUTION,
    PROJECT_FINISHED,
    CONTRACT_CREATED,
    CONTRACT_UPDATED,
    CONTRACT_SENT,
    CONTRACT_SIGNED,
    CONTRACT_TERMINATED,
    CONTRACT_EXPIRED,
    CONTRACT_INTEGRITY_ALERT,
    CONTRACT_RECONCILIATION_REQUIRED,
];

/// Events that need an administrator's attention.
pub fn is_critical(event_type: &str) -> bool {
    matches!(
        event_type,
        CONTRACT_INTEGRITY_ALERT | CONTRACT_RECONCILIATION_REQUIRED
    )
}
