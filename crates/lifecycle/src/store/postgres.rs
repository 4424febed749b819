//! [`GrantStore`] over PostgreSQL.
//!
//! Each command opens a transaction, runs the repository calls from
//! `cultura_db` against it and appends the audit row before committing.
//! Returning early drops the transaction, which rolls it back.

use async_trait::async_trait;
use cultura_core::audit::subjects;
use cultura_core::contract::format_contract_number;
use cultura_core::hashing::digests_equal;
use cultura_core::integrity;
use cultura_core::project::format_project_code;
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
use cultura_db::repositories::{
    ApplicantRepo, AuditEventRepo, CallRepo, ContractNumberRepo, ContractRepo, DocumentRepo,
    ProjectRepo, ReconciliationRepo, SigningTokenRepo,
};
use cultura_db::DbPool;
use sqlx::Acquire;

use super::{
    constraints, AuditDraft, ContractNumbering, GrantStore, SignatureCommit, StoreError,
    StoreResult,
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgGrantStore {
    pool: DbPool,
}

impl PgGrantStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl GrantStore for PgGrantStore {
    async fn ping(&self) -> StoreResult<()> {
        cultura_db::health_check(&self.pool).await?;
        Ok(())
    }

    // -- Calls --------------------------------------------------------------

    async fn insert_call(
        &self,
        input: &CreateCall,
        created_by: Option<DbId>,
        audit: AuditDraft,
    ) -> StoreResult<Call> {
        let mut tx = self.pool.begin().await?;
        let call = CallRepo::insert(&mut *tx, input, created_by).await?;
        let entry = audit.complete(subjects::CALL, call.id, Some(&call))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(call)
    }

    async fn find_call(&self, id: DbId) -> StoreResult<Option<Call>> {
        Ok(CallRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_calls(&self, filter: &CallFilter) -> StoreResult<Vec<Call>> {
        Ok(CallRepo::list(&self.pool, filter).await?)
    }

    async fn update_call(
        &self,
        id: DbId,
        expected: &[CallStatus],
        input: &UpdateCall,
        audit: AuditDraft,
    ) -> StoreResult<Option<Call>> {
        let mut tx = self.pool.begin().await?;
        let Some(call) = CallRepo::update(&mut *tx, id, expected, input).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::CALL, call.id, Some(&call))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(call))
    }

    async fn transition_call(
        &self,
        id: DbId,
        from: &[CallStatus],
        to: CallStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Call>> {
        let mut tx = self.pool.begin().await?;
        let Some(call) = CallRepo::transition(&mut *tx, id, from, to).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::CALL, call.id, Some(&call))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(call))
    }

    async fn delete_call(&self, id: DbId, audit: AuditDraft) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let projects = CallRepo::count_projects(&mut *tx, id).await?;
        if projects > 0 {
            return Err(StoreError::Referenced(format!(
                "call {id} still has {projects} project(s)"
            )));
        }
        if !CallRepo::delete(&mut *tx, id).await? {
            return Ok(false);
        }
        let entry = audit.complete::<Call>(subjects::CALL, id, None)?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_expired_calls(&self, now: Timestamp) -> StoreResult<Vec<Call>> {
        Ok(CallRepo::list_expired(&self.pool, now).await?)
    }

    // -- Applicants ---------------------------------------------------------

    async fn insert_applicant(
        &self,
        input: &CreateApplicant,
        unique_code: &str,
        audit: AuditDraft,
    ) -> StoreResult<Applicant> {
        let mut tx = self.pool.begin().await?;
        let applicant = ApplicantRepo::insert(&mut *tx, input, unique_code).await?;
        let entry = audit.complete(subjects::APPLICANT, applicant.id, Some(&applicant))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(applicant)
    }

    async fn find_applicant(&self, id: DbId) -> StoreResult<Option<Applicant>> {
        Ok(ApplicantRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_applicant_by_user(&self, user_id: DbId) -> StoreResult<Option<Applicant>> {
        Ok(ApplicantRepo::find_by_user_id(&self.pool, user_id).await?)
    }

    async fn applicant_code_exists(&self, code: &str) -> StoreResult<bool> {
        Ok(ApplicantRepo::code_exists(&self.pool, code).await?)
    }

    async fn list_applicants(&self, filter: &ApplicantFilter) -> StoreResult<Vec<Applicant>> {
        Ok(ApplicantRepo::list(&self.pool, filter).await?)
    }

    async fn update_applicant(
        &self,
        id: DbId,
        input: &UpdateApplicant,
        audit: AuditDraft,
    ) -> StoreResult<Option<Applicant>> {
        let mut tx = self.pool.begin().await?;
        let Some(applicant) = ApplicantRepo::update(&mut *tx, id, input).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::APPLICANT, applicant.id, Some(&applicant))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(applicant))
    }

    // -- Projects -----------------------------------------------------------

    async fn insert_project(
        &self,
        input: &CreateProject,
        code_prefix: &str,
        code_year: i32,
        audit: AuditDraft,
    ) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;
        let sequence = CallRepo::next_project_sequence(&mut *tx, input.call_id)
            .await?
            .ok_or_else(|| StoreError::Referenced(format!("call {} no longer exists", input.call_id)))?;
        let code = format_project_code(code_prefix, code_year, input.call_id, sequence);
        let project = ProjectRepo::insert(&mut *tx, input, &code).await?;
        let entry = audit.complete(subjects::PROJECT, project.id, Some(&project))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(ProjectRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_project_for_applicant(
        &self,
        call_id: DbId,
        applicant_id: DbId,
    ) -> StoreResult<Option<Project>> {
        Ok(ProjectRepo::find_by_call_and_applicant(&self.pool, call_id, applicant_id).await?)
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> StoreResult<Vec<Project>> {
        Ok(ProjectRepo::list(&self.pool, filter).await?)
    }

    async fn update_project(
        &self,
        id: DbId,
        expected: &[ProjectStatus],
        input: &UpdateProject,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        let mut tx = self.pool.begin().await?;
        let Some(project) = ProjectRepo::update(&mut *tx, id, expected, input).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::PROJECT, project.id, Some(&project))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(project))
    }

    async fn submit_project(
        &self,
        id: DbId,
        submitted_at: Timestamp,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        let mut tx = self.pool.begin().await?;
        let Some(project) = ProjectRepo::submit(&mut *tx, id, submitted_at).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::PROJECT, project.id, Some(&project))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(project))
    }

    async fn evaluate_project(
        &self,
        id: DbId,
        from: &[ProjectStatus],
        record: &EvaluationRecord,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        let mut tx = self.pool.begin().await?;
        let Some(project) = ProjectRepo::evaluate(&mut *tx, id, from, record).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::PROJECT, project.id, Some(&project))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(project))
    }

    async fn transition_project(
        &self,
        id: DbId,
        from: &[ProjectStatus],
        to: ProjectStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        let mut tx = self.pool.begin().await?;
        let Some(project) = ProjectRepo::transition(&mut *tx, id, from, to).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::PROJECT, project.id, Some(&project))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(project))
    }

    // -- Documents ----------------------------------------------------------

    async fn insert_document(
        &self,
        input: &CreateDocument,
        uploaded_by: Option<DbId>,
        audit: AuditDraft,
    ) -> StoreResult<Document> {
        let mut tx = self.pool.begin().await?;
        let document = DocumentRepo::insert(&mut *tx, input, uploaded_by).await?;
        let entry = audit.complete(&input.subject_kind, input.subject_id, Some(&document))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(document)
    }

    async fn has_document(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        category: &str,
    ) -> StoreResult<bool> {
        Ok(DocumentRepo::exists(&self.pool, subject_kind, subject_id, category).await?)
    }

    async fn list_documents(
        &self,
        subject_kind: &str,
        subject_id: DbId,
    ) -> StoreResult<Vec<Document>> {
        Ok(DocumentRepo::list_for_subject(&self.pool, subject_kind, subject_id).await?)
    }

    // -- Contracts ----------------------------------------------------------

    async fn insert_contract(
        &self,
        input: &NewContract,
        numbering: &ContractNumbering,
        audit: AuditDraft,
    ) -> StoreResult<Contract> {
        let mut tx = self.pool.begin().await?;
        let mut attempt: u32 = 0;

        // Each attempt runs under a savepoint so a colliding number only
        // undoes the insert, and the counter keeps moving forward.
        let contract = loop {
            attempt += 1;
            let sequence = ContractNumberRepo::next(&mut *tx, numbering.year).await?;
            let number = format_contract_number(&numbering.prefix, numbering.year, sequence);

            let mut savepoint = Acquire::begin(&mut tx).await?;
            match ContractRepo::insert(&mut *savepoint, input, &number).await {
                Ok(contract) => {
                    savepoint.commit().await?;
                    break contract;
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    match StoreError::from(err) {
                        StoreError::UniqueViolation(constraint)
                            if constraint == constraints::CONTRACT_NUMBER
                                && attempt < numbering.max_attempts =>
                        {
                            tracing::warn!(
                                contract_number = %number,
                                attempt,
                                "Contract number collision, allocating the next one",
                            );
                        }
                        other => return Err(other),
                    }
                }
            }
        };

        let entry = audit.complete(subjects::CONTRACT, contract.id, Some(&contract))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(contract)
    }

    async fn find_contract(&self, id: DbId) -> StoreResult<Option<Contract>> {
        Ok(ContractRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_contracts_for_project(&self, project_id: DbId) -> StoreResult<Vec<Contract>> {
        Ok(ContractRepo::list_for_project(&self.pool, project_id).await?)
    }

    async fn update_contract(
        &self,
        id: DbId,
        expected: &[ContractStatus],
        changes: &ContractChanges,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>> {
        let mut tx = self.pool.begin().await?;
        let Some(contract) = ContractRepo::update_terms(&mut *tx, id, expected, changes).await?
        else {
            return Ok(None);
        };
        SigningTokenRepo::revoke(&mut *tx, id).await?;
        let entry = audit.complete(subjects::CONTRACT, contract.id, Some(&contract))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(contract))
    }

    async fn set_contract_artifact(&self, id: DbId, artifact_ref: &str) -> StoreResult<()> {
        ContractRepo::set_artifact_ref(&self.pool, id, artifact_ref).await?;
        Ok(())
    }

    async fn record_contract_send(
        &self,
        id: DbId,
        from: &[ContractStatus],
        token: &NewSigningToken,
        channels: &[String],
        sent_at: Timestamp,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>> {
        let mut tx = self.pool.begin().await?;
        let Some(contract) = ContractRepo::mark_sent(&mut *tx, id, from, channels, sent_at).await?
        else {
            return Ok(None);
        };
        SigningTokenRepo::upsert(&mut *tx, id, token).await?;
        let entry = audit.complete(subjects::CONTRACT, contract.id, Some(&contract))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(contract))
    }

    async fn find_signing_token(&self, contract_id: DbId) -> StoreResult<Option<SigningToken>> {
        Ok(SigningTokenRepo::find_by_contract(&self.pool, contract_id).await?)
    }

    async fn commit_signature(
        &self,
        id: DbId,
        token_hash: &str,
        signature: &SignatureRecord,
        audit: AuditDraft,
    ) -> StoreResult<SignatureCommit> {
        let mut tx = self.pool.begin().await?;

        // The CAS takes the row lock first; a concurrent signer blocks here
        // and then finds the contract already signed.
        let signable = [ContractStatus::Draft, ContractStatus::Sent];
        let Some(contract) = ContractRepo::sign(&mut *tx, id, &signable, signature).await? else {
            let status = ContractRepo::status_of(&mut *tx, id)
                .await?
                .map(ContractStatus::try_from)
                .transpose()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            tx.rollback().await?;
            return Ok(SignatureCommit::StatusChanged(status));
        };

        if !SigningTokenRepo::consume(&mut *tx, id, token_hash, signature.signed_at).await? {
            tx.rollback().await?;
            return Ok(SignatureCommit::TokenRejected);
        }

        // The row is locked now, so the hashed fields cannot move under us.
        let stored_hash = integrity::document_hash(&contract.document_fields());
        if !digests_equal(&stored_hash, &signature.document_hash) {
            tx.rollback().await?;
            return Ok(SignatureCommit::ContentChanged(stored_hash));
        }

        let entry = audit.complete(subjects::CONTRACT, contract.id, Some(&contract))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(SignatureCommit::Signed(contract))
    }

    async fn transition_contract(
        &self,
        id: DbId,
        from: &[ContractStatus],
        to: ContractStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>> {
        let mut tx = self.pool.begin().await?;
        let Some(contract) = ContractRepo::transition(&mut *tx, id, from, to).await? else {
            return Ok(None);
        };
        let entry = audit.complete(subjects::CONTRACT, contract.id, Some(&contract))?;
        AuditEventRepo::insert(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(Some(contract))
    }

    async fn list_lapsed_contracts(&self, today: Date) -> StoreResult<Vec<Contract>> {
        Ok(ContractRepo::list_lapsed(&self.pool, today).await?)
    }

    // -- Reconciliation -----------------------------------------------------

    async fn insert_reconciliation_issue(
        &self,
        contract_id: DbId,
        project_id: DbId,
        reason: &str,
    ) -> StoreResult<ReconciliationIssue> {
        Ok(ReconciliationRepo::insert(&self.pool, contract_id, project_id, reason).await?)
    }

    async fn list_open_reconciliation_issues(&self) -> StoreResult<Vec<ReconciliationIssue>> {
        Ok(ReconciliationRepo::list_open(&self.pool).await?)
    }

    async fn resolve_reconciliation_issue(
        &self,
        id: DbId,
        resolved_at: Timestamp,
    ) -> StoreResult<Option<ReconciliationIssue>> {
        Ok(ReconciliationRepo::resolve(&self.pool, id, resolved_at).await?)
    }

    // -- Audit --------------------------------------------------------------

    async fn append_audit(&self, entry: &NewAuditEvent) -> StoreResult<AuditEvent> {
        Ok(AuditEventRepo::insert(&self.pool, entry).await?)
    }

    async fn list_audit(
        &self,
        subject_kind: &str,
        subject_id: DbId,
    ) -> StoreResult<Vec<AuditEvent>> {
        Ok(AuditEventRepo::list_for_subject(&self.pool, subject_kind, subject_id).await?)
    }
}
