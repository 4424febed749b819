//! Persistence seam for the lifecycle services.
//!
//! Every state-changing command on [`GrantStore`] is one unit of work: the
//! row change (a compare-and-swap on the expected status where the command
//! moves a status) and the audit entry commit together or not at all.
//! A CAS that finds the row in another status returns `Ok(None)` so the
//! service can tell a lost race apart from an outage.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use cultura_core::audit::snapshot;
use cultura_core::context::RequestContext;
use cultura_core::error::CoreError;
use cultura_core::status::{CallStatus, ContractStatus, ProjectStatus};
use cultura_core::types::{Date, DbId, Timestamp};
use cultura_db::models::applicant::{Applicant, ApplicantFilter, CreateApplicant, UpdateApplicant};
use cultura_db::models::audit::{AuditEvent, NewAuditEvent};
use cultura_db::models::call::{Call, CallFilter, CreateCall, UpdateCall};
use cultura_db::models::contract::{
    Contract, ContractChanges, NewContract, NewSigningToken, SignatureRecord, SigningToken,
};
use cultura_db::models::document::{CreateDocument, Document};
use cultura_db::models::project::{
    CreateProject, EvaluationRecord, Project, ProjectFilter, UpdateProject,
};
use cultura_db::models::reconciliation::ReconciliationIssue;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Constraint names the services react to.
pub mod constraints {
    pub const CONTRACT_NUMBER: &str = "uq_contracts_contract_number";
    pub const LIVE_EXECUTION: &str = "uq_contracts_live_execution";
    pub const PROJECT_PER_CALL: &str = "uq_projects_call_applicant";
    pub const PROJECT_CODE: &str = "uq_projects_project_code";
    pub const APPLICANT_CODE: &str = "uq_applicants_unique_code";
    pub const APPLICANT_TAX_ID: &str = "uq_applicants_tax_id";
    pub const APPLICANT_EMAIL: &str = "uq_applicants_email";
}

/// Failure reported by a [`GrantStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("row still referenced: {0}")]
    Referenced(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(constraint) = cultura_db::unique_violation_constraint(&err) {
            return Self::UniqueViolation(constraint);
        }
        if cultura_db::is_foreign_key_violation(&err) {
            return Self::Referenced(err.to_string());
        }
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Corrupt(err.to_string())
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::Storage(msg),
            StoreError::UniqueViolation(constraint) => {
                CoreError::Conflict(describe_constraint(&constraint))
            }
            StoreError::Referenced(msg) => CoreError::Conflict(msg),
            StoreError::Corrupt(msg) => CoreError::Internal(msg),
        }
    }
}

/// Human-readable message for a violated unique constraint.
pub fn describe_constraint(constraint: &str) -> String {
    match constraint {
        constraints::CONTRACT_NUMBER => "contract number already allocated".to_string(),
        constraints::LIVE_EXECUTION => {
            "project already has a live execution contract".to_string()
        }
        constraints::PROJECT_PER_CALL => {
            "applicant already has a project in this call".to_string()
        }
        constraints::PROJECT_CODE => "project code already allocated".to_string(),
        constraints::APPLICANT_CODE => "applicant code already allocated".to_string(),
        constraints::APPLICANT_TAX_ID => {
            "an applicant with this tax id is already registered".to_string()
        }
        constraints::APPLICANT_EMAIL => {
            "an applicant with this email is already registered".to_string()
        }
        other => format!("unique constraint '{other}' violated"),
    }
}

// ---------------------------------------------------------------------------
// Command inputs
// ---------------------------------------------------------------------------

/// Audit metadata handed to a state-changing command.
///
/// The store completes it with the subject and the after-snapshot of the row
/// it wrote, inside the same unit of work.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub actor_id: Option<DbId>,
    pub action: &'static str,
    pub before: Option<serde_json::Value>,
    pub context: RequestContext,
    pub occurred_at: Timestamp,
}

impl AuditDraft {
    /// Finish the entry for `subject_kind`/`subject_id` with the written row.
    pub fn complete<T: Serialize>(
        self,
        subject_kind: &str,
        subject_id: DbId,
        after: Option<&T>,
    ) -> StoreResult<NewAuditEvent> {
        let after_snapshot = after
            .map(snapshot)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(NewAuditEvent {
            actor_id: self.actor_id,
            action: self.action.to_string(),
            subject_kind: subject_kind.to_string(),
            subject_id,
            before_snapshot: self.before,
            after_snapshot,
            ip_address: self.context.ip,
            user_agent: self.context.user_agent,
            occurred_at: self.occurred_at,
        })
    }
}

/// How a contract number is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractNumbering {
    pub prefix: String,
    pub year: i32,
    /// Allocation attempts before giving up on collisions.
    pub max_attempts: u32,
}

/// Result of the signing unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureCommit {
    /// Contract signed, token consumed, audit written.
    Signed(Contract),
    /// The contract was not in a signable status; carries what it was.
    StatusChanged(Option<ContractStatus>),
    /// The token was replaced, used or expired between check and commit.
    TokenRejected,
    /// The hashed fields no longer match the hash being signed; carries the
    /// hash of what is stored now.
    ContentChanged(String),
}

// ---------------------------------------------------------------------------
// The seam
// ---------------------------------------------------------------------------

/// Transactional storage for calls, applicants, projects, contracts,
/// signing tokens, documents, reconciliation issues and the audit trail.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // -- Calls --------------------------------------------------------------

    async fn insert_call(
        &self,
        input: &CreateCall,
        created_by: Option<DbId>,
        audit: AuditDraft,
    ) -> StoreResult<Call>;

    async fn find_call(&self, id: DbId) -> StoreResult<Option<Call>>;

    async fn list_calls(&self, filter: &CallFilter) -> StoreResult<Vec<Call>>;

    async fn update_call(
        &self,
        id: DbId,
        expected: &[CallStatus],
        input: &UpdateCall,
        audit: AuditDraft,
    ) -> StoreResult<Option<Call>>;

    async fn transition_call(
        &self,
        id: DbId,
        from: &[CallStatus],
        to: CallStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Call>>;

    /// Remove a call with no projects. [`StoreError::Referenced`] when
    /// projects still point at it; `Ok(false)` when it does not exist.
    async fn delete_call(&self, id: DbId, audit: AuditDraft) -> StoreResult<bool>;

    /// Published or ongoing calls whose `close_at` is before `now`.
    async fn list_expired_calls(&self, now: Timestamp) -> StoreResult<Vec<Call>>;

    // -- Applicants ---------------------------------------------------------

    async fn insert_applicant(
        &self,
        input: &CreateApplicant,
        unique_code: &str,
        audit: AuditDraft,
    ) -> StoreResult<Applicant>;

    async fn find_applicant(&self, id: DbId) -> StoreResult<Option<Applicant>>;

    async fn find_applicant_by_user(&self, user_id: DbId) -> StoreResult<Option<Applicant>>;

    async fn applicant_code_exists(&self, code: &str) -> StoreResult<bool>;

    async fn list_applicants(&self, filter: &ApplicantFilter) -> StoreResult<Vec<Applicant>>;

    async fn update_applicant(
        &self,
        id: DbId,
        input: &UpdateApplicant,
        audit: AuditDraft,
    ) -> StoreResult<Option<Applicant>>;

    // -- Projects -----------------------------------------------------------

    /// Allocate the next per-call code and insert the project in `draft`.
    /// The code is `{code_prefix}-{code_year}-{call_id}-{seq}`.
    async fn insert_project(
        &self,
        input: &CreateProject,
        code_prefix: &str,
        code_year: i32,
        audit: AuditDraft,
    ) -> StoreResult<Project>;

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>>;

    async fn find_project_for_applicant(
        &self,
        call_id: DbId,
        applicant_id: DbId,
    ) -> StoreResult<Option<Project>>;

    async fn list_projects(&self, filter: &ProjectFilter) -> StoreResult<Vec<Project>>;

    async fn update_project(
        &self,
        id: DbId,
        expected: &[ProjectStatus],
        input: &UpdateProject,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>>;

    /// `draft -> submitted` CAS stamping `submitted_at`.
    async fn submit_project(
        &self,
        id: DbId,
        submitted_at: Timestamp,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>>;

    async fn evaluate_project(
        &self,
        id: DbId,
        from: &[ProjectStatus],
        record: &EvaluationRecord,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>>;

    async fn transition_project(
        &self,
        id: DbId,
        from: &[ProjectStatus],
        to: ProjectStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>>;

    // -- Documents ----------------------------------------------------------

    /// Index an uploaded file. The audit entry is filed under the document's
    /// subject.
    async fn insert_document(
        &self,
        input: &CreateDocument,
        uploaded_by: Option<DbId>,
        audit: AuditDraft,
    ) -> StoreResult<Document>;

    async fn has_document(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        category: &str,
    ) -> StoreResult<bool>;

    async fn list_documents(&self, subject_kind: &str, subject_id: DbId)
        -> StoreResult<Vec<Document>>;

    // -- Contracts ----------------------------------------------------------

    /// Take the next yearly number and insert the contract in `draft`.
    /// Number collisions are retried up to `numbering.max_attempts` times
    /// before surfacing as [`StoreError::UniqueViolation`].
    async fn insert_contract(
        &self,
        input: &NewContract,
        numbering: &ContractNumbering,
        audit: AuditDraft,
    ) -> StoreResult<Contract>;

    async fn find_contract(&self, id: DbId) -> StoreResult<Option<Contract>>;

    async fn list_contracts_for_project(&self, project_id: DbId) -> StoreResult<Vec<Contract>>;

    /// Apply `changes` while the status is one of `expected`. The contract
    /// returns to `draft` and its signing token is revoked, so an edited
    /// contract must be sent again before anyone can sign it.
    async fn update_contract(
        &self,
        id: DbId,
        expected: &[ContractStatus],
        changes: &ContractChanges,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>>;

    /// Store the artifact locator. Not audited; the artifact is derived data.
    async fn set_contract_artifact(&self, id: DbId, artifact_ref: &str) -> StoreResult<()>;

    /// Move to `sent`, replace the signing token and record the channels.
    async fn record_contract_send(
        &self,
        id: DbId,
        from: &[ContractStatus],
        token: &NewSigningToken,
        channels: &[String],
        sent_at: Timestamp,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>>;

    async fn find_signing_token(&self, contract_id: DbId) -> StoreResult<Option<SigningToken>>;

    /// CAS the contract into `signed`, consume the token and write the audit
    /// entry, all or nothing.
    async fn commit_signature(
        &self,
        id: DbId,
        token_hash: &str,
        signature: &SignatureRecord,
        audit: AuditDraft,
    ) -> StoreResult<SignatureCommit>;

    async fn transition_contract(
        &self,
        id: DbId,
        from: &[ContractStatus],
        to: ContractStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>>;

    async fn list_lapsed_contracts(&self, today: Date) -> StoreResult<Vec<Contract>>;

    // -- Reconciliation -----------------------------------------------------

    async fn insert_reconciliation_issue(
        &self,
        contract_id: DbId,
        project_id: DbId,
        reason: &str,
    ) -> StoreResult<ReconciliationIssue>;

    async fn list_open_reconciliation_issues(&self) -> StoreResult<Vec<ReconciliationIssue>>;

    async fn resolve_reconciliation_issue(
        &self,
        id: DbId,
        resolved_at: Timestamp,
    ) -> StoreResult<Option<ReconciliationIssue>>;

    // -- Audit --------------------------------------------------------------

    async fn append_audit(&self, entry: &NewAuditEvent) -> StoreResult<AuditEvent>;

    async fn list_audit(&self, subject_kind: &str, subject_id: DbId)
        -> StoreResult<Vec<AuditEvent>>;
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    #[test]
    fn unique_violations_become_conflicts_with_readable_text() {
        let err: CoreError = StoreError::UniqueViolation(constraints::LIVE_EXECUTION.into()).into();
        assert_matches!(err, CoreError::Conflict(msg) if msg.contains("live execution"));
    }

    #[test]
    fn outages_stay_infrastructure_errors() {
        let err: CoreError = StoreError::Unavailable("pool timed out".into()).into();
        assert!(err.is_infrastructure());
    }

    #[test]
    fn draft_completion_redacts_the_after_snapshot() {
        let draft = AuditDraft {
            actor_id: Some(3),
            action: "sign",
            before: None,
            context: RequestContext::new("10.0.0.1", Some("curl".into())),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        };
        let entry = draft
            .complete("contract", 9, Some(&json!({"status": "signed", "signature_payload": {"x": 1}})))
            .unwrap();
        assert_eq!(entry.subject_id, 9);
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        let after = entry.after_snapshot.unwrap();
        assert_eq!(after["status"], "signed");
        assert_eq!(after["signature_payload"], cultura_core::audit::REDACTED);
    }
}
