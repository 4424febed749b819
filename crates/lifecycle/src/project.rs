//! Project (projeto) lifecycle: drafting, submission and evaluation.
//!
//! The `approved -> in_execution` move is not public. Only
//! [`crate::contract::ContractLifecycle`] triggers it, after a signature
//! has committed.

use std::sync::Arc;

use chrono::Datelike;
use cultura_core::applicant;
use cultura_core::audit::{actions, subjects};
use cultura_core::call;
use cultura_core::capability::Caller;
use cultura_core::context::RequestContext;
use cultura_core::error::CoreError;
use cultura_core::project::{self, EvaluationDecision};
use cultura_core::status::ProjectStatus;
use cultura_core::types::DbId;
use cultura_db::models::call::Call;
use cultura_db::models::document::{CreateDocument, Document};
use cultura_db::models::project::{
    CreateProject, EvaluationRecord, Project, ProjectFilter, UpdateProject,
};
use cultura_events::names;
use serde_json::json;

use crate::collaborators::DocumentIndex;
use crate::services::Shared;
use crate::store::{constraints, describe_constraint};

#[derive(Clone)]
pub struct ProjectLifecycle {
    shared: Shared,
    documents: Arc<dyn DocumentIndex>,
}

impl ProjectLifecycle {
    pub fn new(shared: Shared, documents: Arc<dyn DocumentIndex>) -> Self {
        Self { shared, documents }
    }

    // -----------------------------------------------------------------------
    // Drafting
    // -----------------------------------------------------------------------

    /// Open a draft project on a call that is accepting submissions.
    pub async fn create(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        input: CreateProject,
    ) -> Result<Project, CoreError> {
        caller.require(
            caller.owns_applicant(input.applicant_id) || caller.capabilities.manage_projects,
            "create projects for this applicant",
        )?;
        if input.title.trim().is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        project::validate_requested_amount(input.requested_amount)?;
        project::validate_counterpart_amount(input.counterpart_amount)?;

        let call = self.load_call(input.call_id).await?;
        call::ensure_accepting_submissions(
            call.id,
            call.status,
            call.open_at,
            call.close_at,
            self.shared.now(),
        )?;

        let owner = self
            .shared
            .store
            .find_applicant(input.applicant_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: applicant::ENTITY,
                id: input.applicant_id,
            })?;
        if !applicant::can_create_projects(owner.status) {
            return Err(CoreError::validation(
                "applicant_id",
                format!("applicant is '{}'; only active applicants may create projects", owner.status),
            ));
        }
        if self
            .shared
            .store
            .find_project_for_applicant(call.id, owner.id)
            .await?
            .is_some()
        {
            return Err(CoreError::Conflict(describe_constraint(
                constraints::PROJECT_PER_CALL,
            )));
        }

        let input = CreateProject {
            title: input.title.trim().to_string(),
            ..input
        };
        let audit = self
            .shared
            .draft::<Project>(caller, ctx, actions::CREATE, None)?;
        let created = self
            .shared
            .store
            .insert_project(
                &input,
                &self.shared.config.project_code_prefix,
                call.open_at.year(),
                audit,
            )
            .await?;

        tracing::info!(
            project_id = created.id,
            project_code = %created.project_code,
            call_id = call.id,
            applicant_id = owner.id,
            "Project created"
        );
        self.shared.emit(
            names::PROJECT_CREATED,
            subjects::PROJECT,
            created.id,
            caller.user_id,
            json!({
                "project_code": created.project_code,
                "call_id": call.id,
                "applicant_id": owner.id,
            }),
        );
        Ok(created)
    }

    /// Edit narrative and amounts. Owners edit drafts; `manage_projects`
    /// edits any non-terminal project.
    pub async fn update(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        patch: UpdateProject,
    ) -> Result<Project, CoreError> {
        let current = self.load(id).await?;
        let editable = if caller.capabilities.manage_projects {
            project::admin_can_edit(current.status)
        } else if caller.owns_applicant(current.applicant_id) {
            project::owner_can_edit(current.status)
        } else {
            return Err(CoreError::PermissionDenied("edit this project".into()));
        };
        if !editable {
            return Err(CoreError::Conflict(format!(
                "project {id} cannot be edited in status '{}'",
                current.status
            )));
        }

        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(CoreError::validation("title", "must not be empty"));
            }
        }
        if let Some(amount) = patch.requested_amount {
            project::validate_requested_amount(amount)?;
            if current.is_evaluated() && amount != current.requested_amount {
                return Err(CoreError::validation(
                    "requested_amount",
                    "cannot change after evaluation",
                ));
            }
        }
        if let Some(amount) = patch.counterpart_amount {
            project::validate_counterpart_amount(amount)?;
        }

        let audit = self
            .shared
            .draft(caller, ctx, actions::UPDATE, Some(&current))?;
        let updated = self
            .shared
            .store
            .update_project(id, &[current.status], &patch, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!("project {id} changed status during the edit"))
            })?;

        tracing::info!(project_id = id, status = %updated.status, "Project updated");
        self.shared.emit(
            names::PROJECT_UPDATED,
            subjects::PROJECT,
            id,
            caller.user_id,
            json!({ "status": updated.status }),
        );
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit a complete draft inside its call's window.
    pub async fn submit(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<Project, CoreError> {
        let current = self.load(id).await?;
        caller.require(
            caller.owns_applicant(current.applicant_id),
            "submit another applicant's project",
        )?;
        if current.status != ProjectStatus::Draft {
            return Err(CoreError::NotSubmittable {
                project_id: id,
                status: current.status.to_string(),
            });
        }

        let call = self.load_call(current.call_id).await?;
        let now = self.shared.now();
        call::ensure_accepting_submissions(call.id, call.status, call.open_at, call.close_at, now)?;

        let missing_fields = project::missing_narrative_fields(&current.narrative());
        let mut missing_documents = Vec::new();
        for category in &call.required_document_categories {
            if !self
                .documents
                .has_document(subjects::PROJECT, id, category)
                .await?
            {
                missing_documents.push(category.clone());
            }
        }
        if !missing_fields.is_empty() || !missing_documents.is_empty() {
            tracing::debug!(
                project_id = id,
                ?missing_fields,
                ?missing_documents,
                "Submission incomplete"
            );
            return Err(CoreError::IncompleteSubmission {
                missing_fields,
                missing_documents,
            });
        }

        let audit = self
            .shared
            .draft(caller, ctx, actions::SUBMIT, Some(&current))?;
        let Some(submitted) = self.shared.store.submit_project(id, now, audit).await? else {
            let status = self.load(id).await?.status;
            return Err(CoreError::NotSubmittable {
                project_id: id,
                status: status.to_string(),
            });
        };

        tracing::info!(
            project_id = id,
            project_code = %submitted.project_code,
            call_id = call.id,
            "Project submitted"
        );
        self.shared.emit(
            names::PROJECT_SUBMITTED,
            subjects::PROJECT,
            id,
            caller.user_id,
            json!({
                "project_code": submitted.project_code,
                "call_id": call.id,
                "applicant_id": submitted.applicant_id,
                "submitted_at": submitted.submitted_at,
            }),
        );
        Ok(submitted)
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Optional `submitted -> under_review` move. A project already under
    /// review is returned unchanged.
    pub async fn start_review(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<Project, CoreError> {
        caller.require(caller.capabilities.evaluate_projects, "review projects")?;
        let current = self.load(id).await?;
        if current.status == ProjectStatus::UnderReview {
            return Ok(current);
        }
        project::ensure_transition(current.status, ProjectStatus::UnderReview)?;

        let audit = self
            .shared
            .draft(caller, ctx, actions::START_REVIEW, Some(&current))?;
        let moved = self
            .shared
            .store
            .transition_project(id, &[ProjectStatus::Submitted], ProjectStatus::UnderReview, audit)
            .await?;
        let Some(moved) = moved else {
            let latest = self.load(id).await?;
            if latest.status == ProjectStatus::UnderReview {
                return Ok(latest);
            }
            return Err(CoreError::ConcurrencyConflict(format!(
                "project {id} moved to '{}' before review started",
                latest.status
            )));
        };

        tracing::info!(project_id = id, "Project review started");
        self.shared.emit(
            names::PROJECT_REVIEW_STARTED,
            subjects::PROJECT,
            id,
            caller.user_id,
            json!({ "project_code": moved.project_code }),
        );
        Ok(moved)
    }

    /// Record an approval or rejection.
    pub async fn evaluate(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        decision: EvaluationDecision,
    ) -> Result<Project, CoreError> {
        caller.require(caller.capabilities.evaluate_projects, "evaluate projects")?;
        let current = self.load(id).await?;
        let target = decision.decision.target_status();
        if !project::is_evaluable(current.status) {
            return Err(CoreError::invalid_transition(project::ENTITY, current.status, target));
        }
        let validated = project::validate_decision(&decision, current.requested_amount)?;

        let record = EvaluationRecord {
            status: validated.status,
            approved_amount: validated.approved_amount,
            grade: validated.grade,
            technical_opinion: validated.technical_opinion,
            rejection_reason: validated.rejection_reason,
            evaluated_by: caller.user_id,
            evaluated_at: self.shared.now(),
        };
        let audit = self
            .shared
            .draft(caller, ctx, actions::EVALUATE, Some(&current))?;
        let evaluated = self
            .shared
            .store
            .evaluate_project(
                id,
                &[ProjectStatus::Submitted, ProjectStatus::UnderReview],
                &record,
                audit,
            )
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!(
                    "project {id} was evaluated or moved concurrently"
                ))
            })?;

        tracing::info!(
            project_id = id,
            decision = %evaluated.status,
            approved_amount = ?evaluated.approved_amount,
            grade = ?evaluated.evaluation_grade,
            "Project evaluated"
        );
        self.shared.emit(
            names::PROJECT_EVALUATED,
            subjects::PROJECT,
            id,
            caller.user_id,
            json!({
                "decision": decision.decision,
                "approved_amount": evaluated.approved_amount,
                "grade": evaluated.evaluation_grade,
                "reason": evaluated.rejection_reason,
                "previous": current.status,
                "applicant_id": evaluated.applicant_id,
            }),
        );
        Ok(evaluated)
    }

    // -----------------------------------------------------------------------
    // Supporting documents
    // -----------------------------------------------------------------------

    /// Record that a file of `category` was uploaded for a project. Only the
    /// metadata is kept; the file itself lives with the storage collaborator.
    pub async fn attach_document(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        category: &str,
        file_name: &str,
    ) -> Result<Document, CoreError> {
        let current = self.load(id).await?;
        caller.require(
            caller.owns_applicant(current.applicant_id) || caller.capabilities.manage_projects,
            "attach documents to this project",
        )?;
        if current.status != ProjectStatus::Draft && !caller.capabilities.manage_projects {
            return Err(CoreError::Conflict(format!(
                "documents can only be attached while the project is a draft (status '{}')",
                current.status
            )));
        }
        let category = category.trim();
        if category.is_empty() {
            return Err(CoreError::validation("category", "must not be empty"));
        }
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(CoreError::validation("file_name", "must not be empty"));
        }

        let audit = self
            .shared
            .draft::<Document>(caller, ctx, actions::ATTACH_DOCUMENT, None)?;
        let document = self
            .shared
            .store
            .insert_document(
                &CreateDocument {
                    subject_kind: subjects::PROJECT.to_string(),
                    subject_id: id,
                    category: category.to_string(),
                    file_name: file_name.to_string(),
                },
                caller.user_id,
                audit,
            )
            .await?;

        tracing::info!(project_id = id, document_id = document.id, category, "Document attached");
        Ok(document)
    }

    pub async fn documents(&self, caller: &Caller, id: DbId) -> Result<Vec<Document>, CoreError> {
        self.get(caller, id).await?;
        Ok(self
            .shared
            .store
            .list_documents(subjects::PROJECT, id)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Administrative moves
    // -----------------------------------------------------------------------

    /// Cancel a non-terminal project.
    pub async fn cancel(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        reason: &str,
    ) -> Result<Project, CoreError> {
        caller.require(caller.capabilities.manage_projects, "cancel projects")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("reason", "is required when cancelling"));
        }
        let current = self.load(id).await?;
        project::ensure_transition(current.status, ProjectStatus::Cancelled)?;

        let cancelled = self
            .move_to(caller.user_id, ctx, &current, ProjectStatus::Cancelled, actions::CANCEL)
            .await?;

        tracing::info!(project_id = id, from = %current.status, reason, "Project cancelled");
        self.shared.emit(
            names::PROJECT_CANCELLED,
            subjects::PROJECT,
            id,
            caller.user_id,
            json!({ "previous": current.status, "reason": reason }),
        );
        Ok(cancelled)
    }

    /// Close a project whose execution is over.
    pub async fn finish(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<Project, CoreError> {
        caller.require(caller.capabilities.manage_projects, "finish projects")?;
        let current = self.load(id).await?;
        project::ensure_transition(current.status, ProjectStatus::Finished)?;

        let finished = self
            .move_to(caller.user_id, ctx, &current, ProjectStatus::Finished, actions::FINISH)
            .await?;

        tracing::info!(project_id = id, "Project finished");
        self.shared.emit(
            names::PROJECT_FINISHED,
            subjects::PROJECT,
            id,
            caller.user_id,
            json!({ "project_code": finished.project_code }),
        );
        Ok(finished)
    }

    /// `approved -> in_execution`, driven by a committed signature.
    pub(crate) async fn start_execution(
        &self,
        ctx: &RequestContext,
        project_id: DbId,
        contract_id: DbId,
    ) -> Result<Project, CoreError> {
        let current = self.load(project_id).await?;
        project::ensure_transition(current.status, ProjectStatus::InExecution)?;

        let moved = self
            .move_to(None, ctx, &current, ProjectStatus::InExecution, actions::START_EXECUTION)
            .await?;

        tracing::info!(project_id, contract_id, "Project moved into execution");
        self.shared.emit(
            names::PROJECT_IN_EXECUTION,
            subjects::PROJECT,
            project_id,
            None,
            json!({ "contract_id": contract_id, "project_code": moved.project_code }),
        );
        Ok(moved)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get(&self, caller: &Caller, id: DbId) -> Result<Project, CoreError> {
        let found = self.load(id).await?;
        caller.require(
            caller.capabilities.is_staff() || caller.owns_applicant(found.applicant_id),
            "view this project",
        )?;
        Ok(found)
    }

    /// Back-office callers see every project; applicants see their own.
    pub async fn list(
        &self,
        caller: &Caller,
        filter: &ProjectFilter,
    ) -> Result<Vec<Project>, CoreError> {
        if caller.capabilities.is_staff() {
            return Ok(self.shared.store.list_projects(filter).await?);
        }
        let Some(applicant_id) = caller.applicant_id else {
            return Ok(Vec::new());
        };
        let own = ProjectFilter {
            applicant_id: Some(applicant_id),
            ..filter.clone()
        };
        Ok(self.shared.store.list_projects(&own).await?)
    }

    pub(crate) async fn load(&self, id: DbId) -> Result<Project, CoreError> {
        self.shared
            .store
            .find_project(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: project::ENTITY,
                id,
            })
    }

    async fn load_call(&self, id: DbId) -> Result<Call, CoreError> {
        self.shared
            .store
            .find_call(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: call::ENTITY,
                id,
            })
    }

    async fn move_to(
        &self,
        actor_id: Option<DbId>,
        ctx: &RequestContext,
        current: &Project,
        target: ProjectStatus,
        action: &'static str,
    ) -> Result<Project, CoreError> {
        let audit = self
            .shared
            .audit
            .draft(actor_id, ctx, action, Some(current))?;
        self.shared
            .store
            .transition_project(current.id, &[current.status], target, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!(
                    "project {} left status '{}' before the move to '{target}'",
                    current.id, current.status
                ))
            })
    }
}
