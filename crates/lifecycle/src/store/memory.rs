//! [`GrantStore`] held in process memory.
//!
//! All tables sit behind one async mutex, so every command is atomic the
//! same way a database transaction is. The `uq_*` constraints of the SQL
//! schema are checked by hand and reported under the same names. Used by
//! the test suites and by single-process deployments without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cultura_core::audit::subjects;
use cultura_core::clock::{Clock, SystemClock};
use cultura_core::contract::{format_contract_number, has_lapsed, occupies_execution_slot};
use cultura_core::hashing::digests_equal;
use cultura_core::integrity;
use cultura_core::project::format_project_code;
use cultura_core::search::{clamp_limit, clamp_offset, matches_term, DEFAULT_LIMIT, MAX_LIMIT};
use cultura_core::status::{ApplicantStatus, CallStatus, ContractStatus, ProjectStatus};
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
use tokio::sync::Mutex;

use super::{
    constraints, AuditDraft, ContractNumbering, GrantStore, SignatureCommit, StoreError,
    StoreResult,
};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    last_id: DbId,
    calls: BTreeMap<DbId, Call>,
    project_seq: HashMap<DbId, i64>,
    applicants: BTreeMap<DbId, Applicant>,
    projects: BTreeMap<DbId, Project>,
    contracts: BTreeMap<DbId, Contract>,
    tokens: HashMap<DbId, SigningToken>,
    contract_sequences: HashMap<i32, i64>,
    documents: Vec<Document>,
    audit: Vec<AuditEvent>,
    reconciliation: BTreeMap<DbId, ReconciliationIssue>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn append_audit(&mut self, entry: NewAuditEvent, now: Timestamp) -> AuditEvent {
        let event = AuditEvent {
            id: self.next_id(),
            actor_id: entry.actor_id,
            action: entry.action,
            subject_kind: entry.subject_kind,
            subject_id: entry.subject_id,
            before_snapshot: entry.before_snapshot,
            after_snapshot: entry.after_snapshot,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            occurred_at: entry.occurred_at,
            created_at: now,
        };
        self.audit.push(event.clone());
        event
    }

    fn applicant_conflict(
        &self,
        except: Option<DbId>,
        tax_id: Option<&str>,
        email: Option<&str>,
    ) -> Option<&'static str> {
        self.applicants
            .values()
            .filter(|a| Some(a.id) != except)
            .find_map(|a| {
                if tax_id == Some(a.tax_id.as_str()) {
                    Some(constraints::APPLICANT_TAX_ID)
                } else if email == Some(a.email.as_str()) {
                    Some(constraints::APPLICANT_EMAIL)
                } else {
                    None
                }
            })
    }
}

fn page<T>(rows: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let limit = clamp_limit(limit, DEFAULT_LIMIT, MAX_LIMIT) as usize;
    let offset = clamp_offset(offset) as usize;
    rows.into_iter().skip(offset).take(limit).collect()
}

fn matches_any(term: &Option<String>, fields: &[Option<&str>]) -> bool {
    match term.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(term) => fields.iter().flatten().any(|f| matches_term(f, term)),
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store with switches for simulating outages.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    project_transitions_fail: AtomicBool,
    audit_writes_fail: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Row timestamps (`created_at`, `updated_at`) come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
            unavailable: AtomicBool::new(false),
            project_transitions_fail: AtomicBool::new(false),
            audit_writes_fail: AtomicBool::new(false),
        }
    }

    /// Make every command fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only [`GrantStore::transition_project`] fail, leaving the rest up.
    pub fn fail_project_transitions(&self, fail: bool) {
        self.project_transitions_fail.store(fail, Ordering::SeqCst);
    }

    /// Make every audit append fail. Commands that carry an [`AuditDraft`]
    /// then fail before touching any table.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.audit_writes_fail.store(fail, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".into()))
        } else {
            Ok(())
        }
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn ensure_audit_writable(&self) -> StoreResult<()> {
        if self.audit_writes_fail.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("audit log switched off".into()))
        } else {
            Ok(())
        }
    }

    fn audit_entry<T: Serialize>(
        &self,
        audit: AuditDraft,
        subject_kind: &str,
        subject_id: DbId,
        after: Option<&T>,
    ) -> StoreResult<NewAuditEvent> {
        self.ensure_audit_writable()?;
        audit.complete(subject_kind, subject_id, after)
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.ensure_available()
    }

    // -- Calls --------------------------------------------------------------

    async fn insert_call(
        &self,
        input: &CreateCall,
        created_by: Option<DbId>,
        audit: AuditDraft,
    ) -> StoreResult<Call> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let call = Call {
            id: t.next_id(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            regulations: input.regulations.clone(),
            open_at: input.open_at,
            close_at: input.close_at,
            result_at: input.result_at,
            total_budget: input.total_budget,
            status: CallStatus::Draft,
            required_document_categories: input.required_document_categories.clone(),
            evaluation_criteria: input.evaluation_criteria.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        let entry = self.audit_entry(audit, subjects::CALL, call.id, Some(&call))?;
        t.calls.insert(call.id, call.clone());
        t.project_seq.insert(call.id, 0);
        t.append_audit(entry, now);
        Ok(call)
    }

    async fn find_call(&self, id: DbId) -> StoreResult<Option<Call>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.calls.get(&id).cloned())
    }

    async fn list_calls(&self, filter: &CallFilter) -> StoreResult<Vec<Call>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Call> = t
            .calls
            .values()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| {
                matches_any(
                    &filter.search,
                    &[Some(c.title.as_str()), c.description.as_deref()],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.open_at.cmp(&a.open_at).then(b.id.cmp(&a.id)));
        Ok(page(rows, filter.limit, filter.offset))
    }

    async fn update_call(
        &self,
        id: DbId,
        expected: &[CallStatus],
        input: &UpdateCall,
        audit: AuditDraft,
    ) -> StoreResult<Option<Call>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut call) = t.calls.get(&id).cloned() else {
            return Ok(None);
        };
        if !expected.contains(&call.status) {
            return Ok(None);
        }
        if let Some(title) = &input.title {
            call.title = title.trim().to_string();
        }
        if let Some(v) = &input.description {
            call.description = Some(v.clone());
        }
        if let Some(v) = &input.regulations {
            call.regulations = Some(v.clone());
        }
        if let Some(v) = input.open_at {
            call.open_at = v;
        }
        if let Some(v) = input.close_at {
            call.close_at = v;
        }
        if let Some(v) = input.result_at {
            call.result_at = Some(v);
        }
        if let Some(v) = input.total_budget {
            call.total_budget = v;
        }
        if let Some(v) = &input.required_document_categories {
            call.required_document_categories = v.clone();
        }
        if let Some(v) = &input.evaluation_criteria {
            call.evaluation_criteria = Some(v.clone());
        }
        call.updated_at = now;
        let entry = self.audit_entry(audit, subjects::CALL, call.id, Some(&call))?;
        t.calls.insert(id, call.clone());
        t.append_audit(entry, now);
        Ok(Some(call))
    }

    async fn transition_call(
        &self,
        id: DbId,
        from: &[CallStatus],
        to: CallStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Call>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut call) = t.calls.get(&id).cloned() else {
            return Ok(None);
        };
        if !from.contains(&call.status) {
            return Ok(None);
        }
        call.status = to;
        call.updated_at = now;
        let entry = self.audit_entry(audit, subjects::CALL, call.id, Some(&call))?;
        t.calls.insert(id, call.clone());
        t.append_audit(entry, now);
        Ok(Some(call))
    }

    async fn delete_call(&self, id: DbId, audit: AuditDraft) -> StoreResult<bool> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let projects = t.projects.values().filter(|p| p.call_id == id).count();
        if projects > 0 {
            return Err(StoreError::Referenced(format!(
                "call {id} still has {projects} project(s)"
            )));
        }
        if !t.calls.contains_key(&id) {
            return Ok(false);
        }
        let entry = self.audit_entry::<Call>(audit, subjects::CALL, id, None)?;
        t.calls.remove(&id);
        t.project_seq.remove(&id);
        t.append_audit(entry, now);
        Ok(true)
    }

    async fn list_expired_calls(&self, now: Timestamp) -> StoreResult<Vec<Call>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Call> = t
            .calls
            .values()
            .filter(|c| matches!(c.status, CallStatus::Published | CallStatus::Ongoing))
            .filter(|c| c.close_at < now)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.close_at.cmp(&b.close_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    // -- Applicants ---------------------------------------------------------

    async fn insert_applicant(
        &self,
        input: &CreateApplicant,
        unique_code: &str,
        audit: AuditDraft,
    ) -> StoreResult<Applicant> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        if t.applicants.values().any(|a| a.unique_code == unique_code) {
            return Err(StoreError::UniqueViolation(constraints::APPLICANT_CODE.into()));
        }
        if let Some(constraint) =
            t.applicant_conflict(None, Some(&input.tax_id), Some(&input.email))
        {
            return Err(StoreError::UniqueViolation(constraint.into()));
        }
        let applicant = Applicant {
            id: t.next_id(),
            user_id: input.user_id,
            unique_code: unique_code.to_string(),
            legal_kind: input.legal_kind,
            full_name: input.full_name.clone(),
            tax_id: input.tax_id.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            whatsapp: input.whatsapp.clone(),
            address: input.address.clone(),
            city: input.city.clone(),
            state: input.state.clone(),
            postal_code: input.postal_code.clone(),
            status: ApplicantStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let entry = self.audit_entry(audit, subjects::APPLICANT, applicant.id, Some(&applicant))?;
        t.applicants.insert(applicant.id, applicant.clone());
        t.append_audit(entry, now);
        Ok(applicant)
    }

    async fn find_applicant(&self, id: DbId) -> StoreResult<Option<Applicant>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.applicants.get(&id).cloned())
    }

    async fn find_applicant_by_user(&self, user_id: DbId) -> StoreResult<Option<Applicant>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        Ok(t.applicants.values().find(|a| a.user_id == Some(user_id)).cloned())
    }

    async fn applicant_code_exists(&self, code: &str) -> StoreResult<bool> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        Ok(t.applicants.values().any(|a| a.unique_code == code))
    }

    async fn list_applicants(&self, filter: &ApplicantFilter) -> StoreResult<Vec<Applicant>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Applicant> = t
            .applicants
            .values()
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| {
                matches_any(
                    &filter.search,
                    &[
                        Some(a.full_name.as_str()),
                        Some(a.email.as_str()),
                        Some(a.unique_code.as_str()),
                        Some(a.tax_id.as_str()),
                    ],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(page(rows, filter.limit, filter.offset))
    }

    async fn update_applicant(
        &self,
        id: DbId,
        input: &UpdateApplicant,
        audit: AuditDraft,
    ) -> StoreResult<Option<Applicant>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut applicant) = t.applicants.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(constraint) = t.applicant_conflict(Some(id), None, input.email.as_deref()) {
            return Err(StoreError::UniqueViolation(constraint.into()));
        }
        if let Some(v) = &input.full_name {
            applicant.full_name = v.clone();
        }
        if let Some(v) = &input.email {
            applicant.email = v.clone();
        }
        if let Some(v) = &input.phone {
            applicant.phone = Some(v.clone());
        }
        if let Some(v) = &input.whatsapp {
            applicant.whatsapp = Some(v.clone());
        }
        if let Some(v) = &input.address {
            applicant.address = Some(v.clone());
        }
        if let Some(v) = &input.city {
            applicant.city = Some(v.clone());
        }
        if let Some(v) = &input.state {
            applicant.state = Some(v.clone());
        }
        if let Some(v) = &input.postal_code {
            applicant.postal_code = Some(v.clone());
        }
        if let Some(v) = input.status {
            applicant.status = v;
        }
        applicant.updated_at = now;
        let entry = self.audit_entry(audit, subjects::APPLICANT, applicant.id, Some(&applicant))?;
        t.applicants.insert(id, applicant.clone());
        t.append_audit(entry, now);
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
        self.ensure_available()?;
        // Sequences advance before the entry is built.
        self.ensure_audit_writable()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        if !t.applicants.contains_key(&input.applicant_id) {
            return Err(StoreError::Referenced(format!(
                "applicant {} does not exist",
                input.applicant_id
            )));
        }
        if t
            .projects
            .values()
            .any(|p| p.call_id == input.call_id && p.applicant_id == input.applicant_id)
        {
            return Err(StoreError::UniqueViolation(constraints::PROJECT_PER_CALL.into()));
        }
        let Some(seq) = t.project_seq.get_mut(&input.call_id) else {
            return Err(StoreError::Referenced(format!(
                "call {} no longer exists",
                input.call_id
            )));
        };
        *seq += 1;
        let code = format_project_code(code_prefix, code_year, input.call_id, *seq);

        let project = Project {
            id: t.next_id(),
            call_id: input.call_id,
            applicant_id: input.applicant_id,
            project_code: code,
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            objectives: input.objectives.clone(),
            justification: input.justification.clone(),
            methodology: input.methodology.clone(),
            schedule: input.schedule.clone(),
            budget: input.budget.clone(),
            requested_amount: input.requested_amount,
            approved_amount: None,
            counterpart_amount: input.counterpart_amount,
            status: ProjectStatus::Draft,
            evaluation_grade: None,
            technical_opinion: None,
            rejection_reason: None,
            submitted_at: None,
            evaluated_by: None,
            evaluated_at: None,
            created_at: now,
            updated_at: now,
        };
        let entry = self.audit_entry(audit, subjects::PROJECT, project.id, Some(&project))?;
        t.projects.insert(project.id, project.clone());
        t.append_audit(entry, now);
        Ok(project)
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.projects.get(&id).cloned())
    }

    async fn find_project_for_applicant(
        &self,
        call_id: DbId,
        applicant_id: DbId,
    ) -> StoreResult<Option<Project>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        Ok(t
            .projects
            .values()
            .find(|p| p.call_id == call_id && p.applicant_id == applicant_id)
            .cloned())
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> StoreResult<Vec<Project>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Project> = t
            .projects
            .values()
            .filter(|p| filter.call_id.map_or(true, |id| p.call_id == id))
            .filter(|p| filter.applicant_id.map_or(true, |id| p.applicant_id == id))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                matches_any(
                    &filter.search,
                    &[Some(p.title.as_str()), Some(p.project_code.as_str())],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(rows, filter.limit, filter.offset))
    }

    async fn update_project(
        &self,
        id: DbId,
        expected: &[ProjectStatus],
        input: &UpdateProject,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut project) = t.projects.get(&id).cloned() else {
            return Ok(None);
        };
        if !expected.contains(&project.status) {
            return Ok(None);
        }
        if let Some(v) = &input.title {
            project.title = v.trim().to_string();
        }
        if let Some(v) = &input.description {
            project.description = Some(v.clone());
        }
        if let Some(v) = &input.objectives {
            project.objectives = Some(v.clone());
        }
        if let Some(v) = &input.justification {
            project.justification = Some(v.clone());
        }
        if let Some(v) = &input.methodology {
            project.methodology = Some(v.clone());
        }
        if let Some(v) = &input.schedule {
            project.schedule = v.clone();
        }
        if let Some(v) = &input.budget {
            project.budget = v.clone();
        }
        if let Some(v) = input.requested_amount {
            project.requested_amount = v;
        }
        if let Some(v) = input.counterpart_amount {
            project.counterpart_amount = v;
        }
        project.updated_at = now;
        let entry = self.audit_entry(audit, subjects::PROJECT, project.id, Some(&project))?;
        t.projects.insert(id, project.clone());
        t.append_audit(entry, now);
        Ok(Some(project))
    }

    async fn submit_project(
        &self,
        id: DbId,
        submitted_at: Timestamp,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut project) = t.projects.get(&id).cloned() else {
            return Ok(None);
        };
        if project.status != ProjectStatus::Draft {
            return Ok(None);
        }
        project.status = ProjectStatus::Submitted;
        project.submitted_at = Some(submitted_at);
        project.updated_at = now;
        let entry = self.audit_entry(audit, subjects::PROJECT, project.id, Some(&project))?;
        t.projects.insert(id, project.clone());
        t.append_audit(entry, now);
        Ok(Some(project))
    }

    async fn evaluate_project(
        &self,
        id: DbId,
        from: &[ProjectStatus],
        record: &EvaluationRecord,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut project) = t.projects.get(&id).cloned() else {
            return Ok(None);
        };
        if !from.contains(&project.status) {
            return Ok(None);
        }
        project.status = record.status;
        project.approved_amount = record.approved_amount;
        project.evaluation_grade = record.grade;
        project.technical_opinion = record.technical_opinion.clone();
        project.rejection_reason = record.rejection_reason.clone();
        project.evaluated_by = record.evaluated_by;
        project.evaluated_at = Some(record.evaluated_at);
        project.updated_at = now;
        let entry = self.audit_entry(audit, subjects::PROJECT, project.id, Some(&project))?;
        t.projects.insert(id, project.clone());
        t.append_audit(entry, now);
        Ok(Some(project))
    }

    async fn transition_project(
        &self,
        id: DbId,
        from: &[ProjectStatus],
        to: ProjectStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Project>> {
        self.ensure_available()?;
        if self.project_transitions_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "project transitions switched off".into(),
            ));
        }
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut project) = t.projects.get(&id).cloned() else {
            return Ok(None);
        };
        if !from.contains(&project.status) {
            return Ok(None);
        }
        project.status = to;
        project.updated_at = now;
        let entry = self.audit_entry(audit, subjects::PROJECT, project.id, Some(&project))?;
        t.projects.insert(id, project.clone());
        t.append_audit(entry, now);
        Ok(Some(project))
    }

    // -- Documents ----------------------------------------------------------

    async fn insert_document(
        &self,
        input: &CreateDocument,
        uploaded_by: Option<DbId>,
        audit: AuditDraft,
    ) -> StoreResult<Document> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let document = Document {
            id: t.next_id(),
            subject_kind: input.subject_kind.clone(),
            subject_id: input.subject_id,
            category: input.category.clone(),
            file_name: input.file_name.clone(),
            uploaded_by,
            created_at: now,
        };
        let entry = self.audit_entry(audit, &input.subject_kind, input.subject_id, Some(&document))?;
        t.documents.push(document.clone());
        t.append_audit(entry, now);
        Ok(document)
    }

    async fn has_document(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        category: &str,
    ) -> StoreResult<bool> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        Ok(t.documents.iter().any(|d| {
            d.subject_kind == subject_kind && d.subject_id == subject_id && d.category == category
        }))
    }

    async fn list_documents(
        &self,
        subject_kind: &str,
        subject_id: DbId,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Document> = t
            .documents
            .iter()
            .filter(|d| d.subject_kind == subject_kind && d.subject_id == subject_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.category.cmp(&b.category).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    // -- Contracts ----------------------------------------------------------

    async fn insert_contract(
        &self,
        input: &NewContract,
        numbering: &ContractNumbering,
        audit: AuditDraft,
    ) -> StoreResult<Contract> {
        self.ensure_available()?;
        self.ensure_audit_writable()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        if !t.projects.contains_key(&input.project_id) {
            return Err(StoreError::Referenced(format!(
                "project {} does not exist",
                input.project_id
            )));
        }
        if t.contracts.values().any(|c| {
            c.project_id == input.project_id
                && occupies_execution_slot(input.kind, ContractStatus::Draft)
                && occupies_execution_slot(c.kind, c.status)
        }) {
            return Err(StoreError::UniqueViolation(constraints::LIVE_EXECUTION.into()));
        }

        let mut attempt: u32 = 0;
        let number = loop {
            attempt += 1;
            let sequence = t.contract_sequences.entry(numbering.year).or_insert(0);
            *sequence += 1;
            let number = format_contract_number(&numbering.prefix, numbering.year, *sequence);
            if !t.contracts.values().any(|c| c.contract_number == number) {
                break number;
            }
            if attempt >= numbering.max_attempts {
                return Err(StoreError::UniqueViolation(constraints::CONTRACT_NUMBER.into()));
            }
        };

        let contract = Contract {
            id: t.next_id(),
            project_id: input.project_id,
            contract_number: number,
            kind: input.kind,
            rendered_content: input.rendered_content.clone(),
            value: input.value,
            validity_start: input.validity_start,
            validity_end: input.validity_end,
            status: ContractStatus::Draft,
            signed_at: None,
            signer_ip: None,
            signer_user_agent: None,
            signature_payload: None,
            document_hash: None,
            artifact_ref: None,
            sent_channels: Vec::new(),
            sent_at: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };
        let entry = self.audit_entry(audit, subjects::CONTRACT, contract.id, Some(&contract))?;
        t.contracts.insert(contract.id, contract.clone());
        t.append_audit(entry, now);
        Ok(contract)
    }

    async fn find_contract(&self, id: DbId) -> StoreResult<Option<Contract>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.contracts.get(&id).cloned())
    }

    async fn list_contracts_for_project(&self, project_id: DbId) -> StoreResult<Vec<Contract>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Contract> = t
            .contracts
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_contract(
        &self,
        id: DbId,
        expected: &[ContractStatus],
        changes: &ContractChanges,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut contract) = t.contracts.get(&id).cloned() else {
            return Ok(None);
        };
        if !expected.contains(&contract.status) {
            return Ok(None);
        }
        if let Some(v) = &changes.rendered_content {
            contract.rendered_content = v.clone();
        }
        if let Some(v) = changes.value {
            contract.value = v;
        }
        if let Some(v) = changes.validity_start {
            contract.validity_start = v;
        }
        if let Some(v) = changes.validity_end {
            contract.validity_end = v;
        }
        contract.status = ContractStatus::Draft;
        contract.updated_at = now;
        let entry = self.audit_entry(audit, subjects::CONTRACT, contract.id, Some(&contract))?;
        t.contracts.insert(id, contract.clone());
        t.tokens.remove(&id);
        t.append_audit(entry, now);
        Ok(Some(contract))
    }

    async fn set_contract_artifact(&self, id: DbId, artifact_ref: &str) -> StoreResult<()> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        if let Some(contract) = t.contracts.get_mut(&id) {
            contract.artifact_ref = Some(artifact_ref.to_string());
            contract.updated_at = now;
        }
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
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut contract) = t.contracts.get(&id).cloned() else {
            return Ok(None);
        };
        if !from.contains(&contract.status) {
            return Ok(None);
        }
        contract.status = ContractStatus::Sent;
        contract.sent_channels = channels.to_vec();
        contract.sent_at = Some(sent_at);
        contract.updated_at = now;

        let existing = t.tokens.get(&id).map(|e| (e.id, e.created_at));
        let (token_id, created_at) = match existing {
            Some(kept) => kept,
            None => (t.next_id(), now),
        };
        let token_row = SigningToken {
            id: token_id,
            contract_id: id,
            token_hash: token.token_hash.clone(),
            expires_at: token.expires_at,
            used_at: None,
            created_at,
            updated_at: now,
        };

        let entry = self.audit_entry(audit, subjects::CONTRACT, contract.id, Some(&contract))?;
        t.contracts.insert(id, contract.clone());
        t.tokens.insert(id, token_row);
        t.append_audit(entry, now);
        Ok(Some(contract))
    }

    async fn find_signing_token(&self, contract_id: DbId) -> StoreResult<Option<SigningToken>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.tokens.get(&contract_id).cloned())
    }

    async fn commit_signature(
        &self,
        id: DbId,
        token_hash: &str,
        signature: &SignatureRecord,
        audit: AuditDraft,
    ) -> StoreResult<SignatureCommit> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut contract) = t.contracts.get(&id).cloned() else {
            return Ok(SignatureCommit::StatusChanged(None));
        };
        if !matches!(contract.status, ContractStatus::Draft | ContractStatus::Sent) {
            return Ok(SignatureCommit::StatusChanged(Some(contract.status)));
        }
        let Some(mut token) = t.tokens.get(&id).cloned() else {
            return Ok(SignatureCommit::TokenRejected);
        };
        if token.token_hash != token_hash
            || token.is_used()
            || token.is_expired(signature.signed_at)
        {
            return Ok(SignatureCommit::TokenRejected);
        }
        let stored_hash = integrity::document_hash(&contract.document_fields());
        if !digests_equal(&stored_hash, &signature.document_hash) {
            return Ok(SignatureCommit::ContentChanged(stored_hash));
        }

        contract.status = ContractStatus::Signed;
        contract.signed_at = Some(signature.signed_at);
        contract.signer_ip = Some(signature.signer_ip.clone());
        contract.signer_user_agent = signature.signer_user_agent.clone();
        contract.signature_payload = Some(signature.signature_payload.clone());
        contract.document_hash = Some(signature.document_hash.clone());
        contract.updated_at = now;
        token.used_at = Some(signature.signed_at);
        token.updated_at = now;

        let entry = self.audit_entry(audit, subjects::CONTRACT, contract.id, Some(&contract))?;
        t.contracts.insert(id, contract.clone());
        t.tokens.insert(id, token);
        t.append_audit(entry, now);
        Ok(SignatureCommit::Signed(contract))
    }

    async fn transition_contract(
        &self,
        id: DbId,
        from: &[ContractStatus],
        to: ContractStatus,
        audit: AuditDraft,
    ) -> StoreResult<Option<Contract>> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let Some(mut contract) = t.contracts.get(&id).cloned() else {
            return Ok(None);
        };
        if !from.contains(&contract.status) {
            return Ok(None);
        }
        contract.status = to;
        contract.updated_at = now;
        let entry = self.audit_entry(audit, subjects::CONTRACT, contract.id, Some(&contract))?;
        t.contracts.insert(id, contract.clone());
        t.append_audit(entry, now);
        Ok(Some(contract))
    }

    async fn list_lapsed_contracts(&self, today: Date) -> StoreResult<Vec<Contract>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<Contract> = t
            .contracts
            .values()
            .filter(|c| has_lapsed(c.status, c.validity_end, today))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.validity_end.cmp(&b.validity_end).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    // -- Reconciliation -----------------------------------------------------

    async fn insert_reconciliation_issue(
        &self,
        contract_id: DbId,
        project_id: DbId,
        reason: &str,
    ) -> StoreResult<ReconciliationIssue> {
        self.ensure_available()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        let issue = ReconciliationIssue {
            id: t.next_id(),
            contract_id,
            project_id,
            reason: reason.to_string(),
            resolved_at: None,
            created_at: now,
        };
        t.reconciliation.insert(issue.id, issue.clone());
        Ok(issue)
    }

    async fn list_open_reconciliation_issues(&self) -> StoreResult<Vec<ReconciliationIssue>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        Ok(t
            .reconciliation
            .values()
            .filter(|i| i.resolved_at.is_none())
            .cloned()
            .collect())
    }

    async fn resolve_reconciliation_issue(
        &self,
        id: DbId,
        resolved_at: Timestamp,
    ) -> StoreResult<Option<ReconciliationIssue>> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        match t.reconciliation.get_mut(&id) {
            Some(issue) if issue.resolved_at.is_none() => {
                issue.resolved_at = Some(resolved_at);
                Ok(Some(issue.clone()))
            }
            _ => Ok(None),
        }
    }

    // -- Audit --------------------------------------------------------------

    async fn append_audit(&self, entry: &NewAuditEvent) -> StoreResult<AuditEvent> {
        self.ensure_available()?;
        self.ensure_audit_writable()?;
        let now = self.now();
        let mut t = self.tables.lock().await;
        Ok(t.append_audit(entry.clone(), now))
    }

    async fn list_audit(
        &self,
        subject_kind: &str,
        subject_id: DbId,
    ) -> StoreResult<Vec<AuditEvent>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<AuditEvent> = t
            .audit
            .iter()
            .filter(|e| e.subject_kind == subject_kind && e.subject_id == subject_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
