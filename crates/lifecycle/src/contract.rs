//! Contract (contrato) lifecycle and the signature-binding protocol.
//!
//! `sign` is the one operation reachable without an authenticated caller:
//! the signer proves possession of the token issued by `send`. The signing
//! unit of work (status compare-and-swap, token consumption, signature
//! columns and audit entry) commits before anything else happens; the
//! project move into execution, the event and the signed artifact follow
//! and can fail without undoing the signature.

use std::sync::Arc;

use chrono::Datelike;
use cultura_core::audit::{actions, subjects};
use cultura_core::capability::Caller;
use cultura_core::context::RequestContext;
use cultura_core::contract;
use cultura_core::error::CoreError;
use cultura_core::hashing::digests_equal;
use cultura_core::integrity;
use cultura_core::money;
use cultura_core::project::json_is_empty;
use cultura_core::signing;
use cultura_core::status::{ContractKind, ContractStatus, ProjectStatus};
use cultura_core::tax_id;
use cultura_core::template::{self, ContractTemplateData, TemplateContext};
use cultura_core::types::{Date, DbId, Money, Timestamp};
use cultura_db::models::applicant::Applicant;
use cultura_db::models::contract::{
    Contract, ContractChanges, CreateContract, NewContract, NewSigningToken, SignatureRecord,
    SigningToken, UpdateContract,
};
use cultura_db::models::project::Project;
use cultura_db::models::reconciliation::ReconciliationIssue;
use cultura_events::names;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::collaborators::{
    ArtifactStorage, CollaboratorError, DocumentRenderer, SigningNotice, SigningNotifier,
};
use crate::project::ProjectLifecycle;
use crate::services::Shared;
use crate::store::{constraints, describe_constraint, ContractNumbering, SignatureCommit, StoreError};

/// Entity name for reconciliation issues in errors.
const RECONCILIATION_ENTITY: &str = "ReconciliationIssue";

const SIGNABLE: [ContractStatus; 2] = [ContractStatus::Draft, ContractStatus::Sent];

// ---------------------------------------------------------------------------
// Request / outcome types
// ---------------------------------------------------------------------------

/// What an external signer submits.
#[derive(Clone, Deserialize)]
pub struct SignRequest {
    pub token: String,
    /// Opaque captured signature (drawn strokes, typed name, ...).
    pub signature_payload: serde_json::Value,
    /// Hash the signer was shown, when the client echoes it back.
    #[serde(default)]
    pub shown_document_hash: Option<String>,
}

impl std::fmt::Debug for SignRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignRequest")
            .field("token", &"[REDACTED]")
            .field("shown_document_hash", &self.shown_document_hash)
            .finish_non_exhaustive()
    }
}

/// Per-channel result of handing a signing notice to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `send`. `token` is the only copy of the plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub contract: Contract,
    pub signing_link: String,
    pub token: String,
    pub expires_at: Timestamp,
    pub deliveries: Vec<DeliveryOutcome>,
}

/// What happened to the project after a signature committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectFollowUp {
    /// The project moved into execution.
    Completed,
    /// Not an execution contract; the project is left alone.
    NotRequired,
    /// The move failed and a reconciliation issue was opened.
    PendingReconciliation,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignOutcome {
    pub contract: Contract,
    pub project_transition: ProjectFollowUp,
}

impl SignOutcome {
    /// What the signer gets back: the outcome without any storage locators
    /// or signer metadata.
    pub fn receipt(&self) -> SignedReceipt {
        SignedReceipt {
            contract_id: self.contract.id,
            contract_number: self.contract.contract_number.clone(),
            status: self.contract.status,
            signed_at: self.contract.signed_at,
            document_hash: self.contract.document_hash.clone(),
            project_transition: self.project_transition,
        }
    }
}

/// Confirmation returned to the token holder after signing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedReceipt {
    pub contract_id: DbId,
    pub contract_number: String,
    pub status: ContractStatus,
    pub signed_at: Option<Timestamp>,
    pub document_hash: Option<String>,
    pub project_transition: ProjectFollowUp,
}

/// The document as presented to a token holder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SigningView {
    pub contract_id: DbId,
    pub contract_number: String,
    pub kind: ContractKind,
    pub content: String,
    pub value: Money,
    pub validity_start: Date,
    pub validity_end: Date,
    pub status: ContractStatus,
    pub document_hash: String,
    pub token_expires_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub contract_id: DbId,
    pub contract_number: String,
    pub document_hash: String,
    pub signed_at: Option<Timestamp>,
    pub verified_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ContractLifecycle {
    shared: Shared,
    projects: ProjectLifecycle,
    renderer: Arc<dyn DocumentRenderer>,
    artifacts: Arc<dyn ArtifactStorage>,
    notifier: Arc<dyn SigningNotifier>,
}

impl ContractLifecycle {
    pub fn new(
        shared: Shared,
        projects: ProjectLifecycle,
        renderer: Arc<dyn DocumentRenderer>,
        artifacts: Arc<dyn ArtifactStorage>,
        notifier: Arc<dyn SigningNotifier>,
    ) -> Self {
        Self {
            shared,
            projects,
            renderer,
            artifacts,
            notifier,
        }
    }

    // -----------------------------------------------------------------------
    // Drafting
    // -----------------------------------------------------------------------

    /// Render a template against an approved project and store the result
    /// in `draft` under the next contract number.
    pub async fn create(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        input: CreateContract,
    ) -> Result<Contract, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "create contracts")?;
        if input.template.trim().is_empty() {
            return Err(CoreError::validation("template", "must not be empty"));
        }
        contract::validate_terms(input.value, input.validity_start, input.validity_end)?;

        let kind = input.kind.unwrap_or(ContractKind::Execution);
        let project = self.projects.load(input.project_id).await?;
        if !project_accepts(kind, project.status) {
            return Err(CoreError::invalid_transition(
                contract::ENTITY,
                format!("project {}", project.status),
                ContractStatus::Draft,
            ));
        }
        if kind == ContractKind::Execution {
            let existing = self
                .shared
                .store
                .list_contracts_for_project(project.id)
                .await?;
            if existing
                .iter()
                .any(|c| contract::occupies_execution_slot(c.kind, c.status))
            {
                return Err(CoreError::Conflict(describe_constraint(
                    constraints::LIVE_EXECUTION,
                )));
            }
        }

        let rendered_content = self
            .render_content(
                &input.template,
                &project,
                input.value,
                input.validity_start,
                input.validity_end,
            )
            .await?;
        let new = NewContract {
            project_id: project.id,
            kind,
            rendered_content,
            value: input.value,
            validity_start: input.validity_start,
            validity_end: input.validity_end,
            created_by: caller.user_id,
        };
        let numbering = ContractNumbering {
            prefix: self.shared.config.contract_number_prefix.clone(),
            year: self.shared.now().year(),
            max_attempts: self.shared.config.numbering_max_retries + 1,
        };

        let audit = self
            .shared
            .draft::<Contract>(caller, ctx, actions::CREATE, None)?;
        let created = match self.shared.store.insert_contract(&new, &numbering, audit).await {
            Ok(created) => created,
            Err(StoreError::UniqueViolation(c)) if c == constraints::CONTRACT_NUMBER => {
                tracing::warn!(
                    project_id = project.id,
                    year = numbering.year,
                    attempts = numbering.max_attempts,
                    "Contract numbering kept colliding"
                );
                return Err(CoreError::ConcurrencyConflict(
                    "could not allocate a contract number; retry the request".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            contract_id = created.id,
            contract_number = %created.contract_number,
            project_id = project.id,
            kind = %created.kind,
            "Contract created"
        );
        self.shared.emit(
            names::CONTRACT_CREATED,
            subjects::CONTRACT,
            created.id,
            caller.user_id,
            json!({
                "contract_number": created.contract_number,
                "project_id": project.id,
                "kind": created.kind,
                "value": created.value,
            }),
        );
        Ok(self.attach_artifact(created).await)
    }

    /// Edit an unsigned contract. A new template is required whenever the
    /// value or validity changes so the text keeps matching the terms.
    ///
    /// Editing a `sent` contract revokes its signing link and returns it to
    /// `draft`; it has to be sent again.
    pub async fn update(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        patch: UpdateContract,
    ) -> Result<Contract, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "edit contracts")?;
        let current = self.load(id).await?;
        if !contract::is_editable(current.status) {
            return Err(CoreError::Conflict(format!(
                "contract {id} is '{}'; signed terms are immutable",
                current.status
            )));
        }

        let value = patch.value.unwrap_or(current.value);
        let validity_start = patch.validity_start.unwrap_or(current.validity_start);
        let validity_end = patch.validity_end.unwrap_or(current.validity_end);
        contract::validate_terms(value, validity_start, validity_end)?;

        let terms_changed = value != current.value
            || validity_start != current.validity_start
            || validity_end != current.validity_end;
        let rendered_content = match patch.template.as_deref() {
            Some(t) if t.trim().is_empty() => {
                return Err(CoreError::validation("template", "must not be empty"));
            }
            Some(t) => {
                let project = self.projects.load(current.project_id).await?;
                Some(
                    self.render_content(t, &project, value, validity_start, validity_end)
                        .await?,
                )
            }
            None if terms_changed => {
                return Err(CoreError::validation(
                    "template",
                    "is required when value or validity change",
                ));
            }
            None => None,
        };

        let changes = ContractChanges {
            rendered_content,
            value: patch.value,
            validity_start: patch.validity_start,
            validity_end: patch.validity_end,
        };
        let audit = self
            .shared
            .draft(caller, ctx, actions::UPDATE, Some(&current))?;
        let updated = self
            .shared
            .store
            .update_contract(id, &SIGNABLE, &changes, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!("contract {id} was signed during the edit"))
            })?;

        let link_revoked = current.status == ContractStatus::Sent;
        tracing::info!(contract_id = id, link_revoked, "Contract updated");
        self.shared.emit(
            names::CONTRACT_UPDATED,
            subjects::CONTRACT,
            id,
            caller.user_id,
            json!({
                "contract_number": updated.contract_number,
                "document_hash": integrity::document_hash(&updated.document_fields()),
                "link_revoked": link_revoked,
            }),
        );
        Ok(self.attach_artifact(updated).await)
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Issue a fresh signing token and notify the applicant on each channel.
    ///
    /// The first send moves `draft -> sent`; re-sending a sent contract only
    /// replaces the token. Delivery runs after the commit and its failures
    /// are reported, never rolled back.
    pub async fn send(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        channels: &[String],
    ) -> Result<SendOutcome, CoreError> {
        caller.require(caller.capabilities.send_contracts, "send contracts")?;
        let channels = normalize_channels(channels);
        if channels.is_empty() {
            return Err(CoreError::validation("channels", "at least one channel is required"));
        }
        let current = self.load(id).await?;
        if !contract::is_signable(current.status) {
            return Err(CoreError::invalid_transition(
                contract::ENTITY,
                current.status,
                ContractStatus::Sent,
            ));
        }
        let project = self.projects.load(current.project_id).await?;
        let recipient = self.load_applicant(project.applicant_id).await?;

        let now = self.shared.now();
        let token = signing::generate_token();
        let expires_at = now + self.shared.config.signing_token_ttl_chrono();
        let issued = NewSigningToken {
            token_hash: token.hash.clone(),
            expires_at,
        };

        let audit = self
            .shared
            .draft(caller, ctx, actions::SEND, Some(&current))?;
        let sent = self
            .shared
            .store
            .record_contract_send(id, &SIGNABLE, &issued, &channels, now, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!("contract {id} was signed while sending"))
            })?;

        let signing_link = self.shared.config.signing_link(id, &token.plaintext);
        let mut deliveries = Vec::with_capacity(channels.len());
        for channel in &channels {
            let notice = SigningNotice {
                contract_id: id,
                contract_number: sent.contract_number.clone(),
                channel: channel.clone(),
                recipient_name: recipient.full_name.clone(),
                recipient_email: recipient.email.clone(),
                recipient_phone: phone_for(channel, &recipient),
                signing_link: signing_link.clone(),
                expires_at,
            };
            let outcome = match self.notifier.notify(&notice).await {
                Ok(()) => DeliveryOutcome {
                    channel: channel.clone(),
                    delivered: true,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(contract_id = id, channel = %channel, error = %e, "Signing notice delivery failed");
                    DeliveryOutcome {
                        channel: channel.clone(),
                        delivered: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            deliveries.push(outcome);
        }

        let delivered = deliveries.iter().filter(|d| d.delivered).count();
        tracing::info!(
            contract_id = id,
            contract_number = %sent.contract_number,
            channels = ?channels,
            delivered,
            expires_at = %expires_at,
            "Contract sent for signature"
        );
        self.shared.emit(
            names::CONTRACT_SENT,
            subjects::CONTRACT,
            id,
            caller.user_id,
            json!({
                "contract_number": sent.contract_number,
                "applicant_id": recipient.id,
                "channels": channels,
                "deliveries": deliveries,
                "expires_at": expires_at,
                "first_send": current.status == ContractStatus::Draft,
            }),
        );

        Ok(SendOutcome {
            contract: sent,
            signing_link,
            token: token.plaintext,
            expires_at,
            deliveries,
        })
    }

    // -----------------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------------

    /// The document a token holder is about to sign.
    pub async fn signing_view(&self, id: DbId, token: &str) -> Result<SigningView, CoreError> {
        let (current, issued) = self.authenticate(id, token).await?;
        Ok(SigningView {
            contract_id: current.id,
            document_hash: integrity::document_hash(&current.document_fields()),
            contract_number: current.contract_number,
            kind: current.kind,
            content: current.rendered_content,
            value: current.value,
            validity_start: current.validity_start,
            validity_end: current.validity_end,
            status: current.status,
            token_expires_at: issued.expires_at,
        })
    }

    /// Bind a signature to the persisted document.
    pub async fn sign(
        &self,
        id: DbId,
        request: SignRequest,
        ctx: &RequestContext,
    ) -> Result<SignOutcome, CoreError> {
        let (current, _) = self.authenticate(id, &request.token).await?;
        match current.status {
            status if contract::is_signable(status) => {}
            ContractStatus::Signed | ContractStatus::Active => {
                return Err(CoreError::AlreadySigned { contract_id: id });
            }
            status => {
                return Err(CoreError::CannotSign {
                    contract_id: id,
                    status: status.to_string(),
                });
            }
        }
        if json_is_empty(&request.signature_payload) {
            return Err(CoreError::validation("signature_payload", "must not be empty"));
        }

        let document_hash = integrity::document_hash(&current.document_fields());
        if let Some(shown) = request.shown_document_hash.as_deref() {
            let shown = shown.trim().to_ascii_lowercase();
            if !digests_equal(&document_hash, &shown) {
                return Err(self
                    .integrity_alert(&current, shown, document_hash, "signing", ctx)
                    .await);
            }
        }

        let signature = SignatureRecord {
            signed_at: self.shared.now(),
            signer_ip: ctx.ip_or_unknown().to_string(),
            signer_user_agent: ctx.user_agent.clone(),
            signature_payload: request.signature_payload,
            document_hash: document_hash.clone(),
        };
        let audit = self
            .shared
            .audit
            .draft(None, ctx, actions::SIGN, Some(&current))?;
        let token_hash = signing::hash_token(&request.token);
        let signed = match self
            .shared
            .store
            .commit_signature(id, &token_hash, &signature, audit)
            .await?
        {
            SignatureCommit::Signed(signed) => signed,
            SignatureCommit::StatusChanged(Some(ContractStatus::Signed | ContractStatus::Active)) => {
                return Err(CoreError::AlreadySigned { contract_id: id });
            }
            SignatureCommit::StatusChanged(Some(status)) => {
                return Err(CoreError::CannotSign {
                    contract_id: id,
                    status: status.to_string(),
                });
            }
            SignatureCommit::StatusChanged(None) | SignatureCommit::TokenRejected => {
                return Err(CoreError::InvalidOrExpiredToken);
            }
            SignatureCommit::ContentChanged(stored) => {
                return Err(self
                    .integrity_alert(&current, document_hash, stored, "signing", ctx)
                    .await);
            }
        };

        tracing::info!(
            contract_id = id,
            contract_number = %signed.contract_number,
            project_id = signed.project_id,
            signer_ip = %signature.signer_ip,
            document_hash = %signature.document_hash,
            "Contract signed"
        );

        let project_transition = if signed.kind == ContractKind::Execution {
            match self
                .projects
                .start_execution(ctx, signed.project_id, signed.id)
                .await
            {
                Ok(_) => ProjectFollowUp::Completed,
                Err(e) => {
                    self.open_reconciliation(&signed, &e, ctx).await;
                    ProjectFollowUp::PendingReconciliation
                }
            }
        } else {
            ProjectFollowUp::NotRequired
        };

        self.shared.emit(
            names::CONTRACT_SIGNED,
            subjects::CONTRACT,
            id,
            None,
            json!({
                "contract_number": signed.contract_number,
                "project_id": signed.project_id,
                "document_hash": signed.document_hash,
                "signed_at": signed.signed_at,
                "project_transition": project_transition,
            }),
        );

        let signed = self.attach_artifact(signed).await;
        Ok(SignOutcome {
            contract: signed,
            project_transition,
        })
    }

    /// Check `token` against the live token of contract `id`.
    ///
    /// Every failure that could reveal whether the contract exists reports
    /// [`CoreError::InvalidOrExpiredToken`]. A consumed token on a signed
    /// contract reports [`CoreError::AlreadySigned`].
    async fn authenticate(
        &self,
        id: DbId,
        token: &str,
    ) -> Result<(Contract, SigningToken), CoreError> {
        if !signing::looks_like_token(token) {
            return Err(CoreError::InvalidOrExpiredToken);
        }
        let issued = self
            .shared
            .store
            .find_signing_token(id)
            .await?
            .ok_or(CoreError::InvalidOrExpiredToken)?;
        if !digests_equal(&signing::hash_token(token), &issued.token_hash) {
            return Err(CoreError::InvalidOrExpiredToken);
        }
        // Read after the token so a signature committed in between shows up.
        let current = self
            .shared
            .store
            .find_contract(id)
            .await?
            .ok_or(CoreError::InvalidOrExpiredToken)?;
        if issued.is_used() {
            return match current.status {
                ContractStatus::Signed | ContractStatus::Active => {
                    Err(CoreError::AlreadySigned { contract_id: id })
                }
                _ => Err(CoreError::InvalidOrExpiredToken),
            };
        }
        if issued.is_expired(self.shared.now()) {
            return Err(CoreError::InvalidOrExpiredToken);
        }
        Ok((current, issued))
    }

    // -----------------------------------------------------------------------
    // Integrity and artifacts
    // -----------------------------------------------------------------------

    /// Recompute a signed contract's hash from its stored fields.
    pub async fn verify_integrity(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<IntegrityReport, CoreError> {
        caller.require(caller.capabilities.is_staff(), "verify contracts")?;
        let current = self.load(id).await?;
        let Some(expected) = current.document_hash.clone() else {
            return Err(CoreError::Conflict(format!(
                "contract {id} is '{}' and carries no signed hash",
                current.status
            )));
        };
        if let Err(CoreError::IntegrityMismatch { actual, .. }) =
            integrity::verify(id, &current.document_fields(), &expected)
        {
            return Err(self
                .integrity_alert(&current, expected, actual, "verification", ctx)
                .await);
        }

        tracing::info!(contract_id = id, "Contract integrity verified");
        Ok(IntegrityReport {
            contract_id: id,
            contract_number: current.contract_number,
            document_hash: expected,
            signed_at: current.signed_at,
            verified_at: self.shared.now(),
        })
    }

    /// Re-run the artifact rendering. Unlike the best-effort runs after
    /// create and sign, a failure here is reported.
    pub async fn regenerate_artifact(
        &self,
        caller: &Caller,
        id: DbId,
    ) -> Result<Contract, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "regenerate contract artifacts")?;
        let mut current = self.load(id).await?;
        let locator = self.produce_artifact(&current).await.map_err(|e| {
            tracing::warn!(contract_id = id, error = %e, "Artifact regeneration failed");
            CoreError::Internal(format!("artifact regeneration failed: {e}"))
        })?;
        tracing::info!(contract_id = id, artifact = %locator, "Contract artifact regenerated");
        current.artifact_ref = Some(locator);
        Ok(current)
    }

    // -----------------------------------------------------------------------
    // Administrative moves
    // -----------------------------------------------------------------------

    /// `signed | active -> terminated`.
    pub async fn terminate(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        reason: &str,
    ) -> Result<Contract, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "terminate contracts")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("reason", "is required when terminating"));
        }
        let current = self.load(id).await?;
        contract::ensure_transition(current.status, ContractStatus::Terminated)?;

        let audit = self
            .shared
            .draft(caller, ctx, actions::TERMINATE, Some(&current))?;
        let terminated = self
            .shared
            .store
            .transition_contract(id, &[current.status], ContractStatus::Terminated, audit)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!("contract {id} changed status concurrently"))
            })?;

        tracing::info!(contract_id = id, reason, "Contract terminated");
        self.shared.emit(
            names::CONTRACT_TERMINATED,
            subjects::CONTRACT,
            id,
            caller.user_id,
            json!({
                "contract_number": terminated.contract_number,
                "previous": current.status,
                "reason": reason,
            }),
        );
        Ok(terminated)
    }

    /// Expire signed or active contracts whose validity ended before
    /// `today` (the service clock's date when not given).
    pub async fn expire_lapsed(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        today: Option<Date>,
    ) -> Result<Vec<Contract>, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "expire contracts")?;
        let today = today.unwrap_or_else(|| self.shared.now().date_naive());
        let lapsed = self.shared.store.list_lapsed_contracts(today).await?;

        let mut expired = Vec::new();
        for candidate in lapsed {
            let audit = self
                .shared
                .draft(caller, ctx, actions::EXPIRE, Some(&candidate))?;
            let Some(moved) = self
                .shared
                .store
                .transition_contract(
                    candidate.id,
                    &[ContractStatus::Signed, ContractStatus::Active],
                    ContractStatus::Expired,
                    audit,
                )
                .await?
            else {
                continue;
            };
            tracing::info!(
                contract_id = moved.id,
                validity_end = %moved.validity_end,
                "Contract expired"
            );
            self.shared.emit(
                names::CONTRACT_EXPIRED,
                subjects::CONTRACT,
                moved.id,
                caller.user_id,
                json!({
                    "contract_number": moved.contract_number,
                    "validity_end": moved.validity_end,
                }),
            );
            expired.push(moved);
        }
        Ok(expired)
    }

    pub async fn reconciliation_issues(
        &self,
        caller: &Caller,
    ) -> Result<Vec<ReconciliationIssue>, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "list reconciliation issues")?;
        Ok(self.shared.store.list_open_reconciliation_issues().await?)
    }

    pub async fn resolve_reconciliation(
        &self,
        caller: &Caller,
        id: DbId,
    ) -> Result<ReconciliationIssue, CoreError> {
        caller.require(caller.capabilities.manage_contracts, "resolve reconciliation issues")?;
        let resolved = self
            .shared
            .store
            .resolve_reconciliation_issue(id, self.shared.now())
            .await?
            .ok_or(CoreError::NotFound {
                entity: RECONCILIATION_ENTITY,
                id,
            })?;
        tracing::info!(
            issue_id = id,
            contract_id = resolved.contract_id,
            project_id = resolved.project_id,
            "Reconciliation issue resolved"
        );
        Ok(resolved)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get(&self, caller: &Caller, id: DbId) -> Result<Contract, CoreError> {
        let found = self.load(id).await?;
        self.ensure_can_view(caller, found.project_id).await?;
        Ok(found)
    }

    pub async fn list_for_project(
        &self,
        caller: &Caller,
        project_id: DbId,
    ) -> Result<Vec<Contract>, CoreError> {
        self.ensure_can_view(caller, project_id).await?;
        Ok(self
            .shared
            .store
            .list_contracts_for_project(project_id)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load(&self, id: DbId) -> Result<Contract, CoreError> {
        self.shared
            .store
            .find_contract(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: contract::ENTITY,
                id,
            })
    }

    async fn load_applicant(&self, id: DbId) -> Result<Applicant, CoreError> {
        self.shared
            .store
            .find_applicant(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: cultura_core::applicant::ENTITY,
                id,
            })
    }

    async fn ensure_can_view(&self, caller: &Caller, project_id: DbId) -> Result<(), CoreError> {
        if caller.capabilities.is_staff() {
            return Ok(());
        }
        let project = self.projects.load(project_id).await?;
        caller.require(caller.owns_applicant(project.applicant_id), "view these contracts")
    }

    async fn render_content(
        &self,
        template_text: &str,
        project: &Project,
        value: Money,
        validity_start: Date,
        validity_end: Date,
    ) -> Result<String, CoreError> {
        let applicant = self.load_applicant(project.applicant_id).await?;
        let call = self
            .shared
            .store
            .find_call(project.call_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: cultura_core::call::ENTITY,
                id: project.call_id,
            })?;

        let tax_id = tax_id::format(&applicant.tax_id);
        let address = full_address(&applicant);
        let data = ContractTemplateData {
            project_title: &project.title,
            project_code: &project.project_code,
            approved_amount: project.approved_amount,
            requested_amount: project.requested_amount,
            applicant_name: &applicant.full_name,
            applicant_tax_id: &tax_id,
            applicant_email: &applicant.email,
            applicant_phone: applicant.phone.as_deref(),
            applicant_address: address.as_deref(),
            applicant_code: &applicant.unique_code,
            call_title: &call.title,
            contract_value: value,
            validity_start,
            validity_end,
            today: self.shared.now().date_naive(),
        };
        let rendered = template::render(template_text, &TemplateContext::from(&data));
        if !rendered.unresolved.is_empty() {
            tracing::warn!(
                project_id = project.id,
                unresolved = ?rendered.unresolved,
                "Contract template has placeholders with no value"
            );
        }
        Ok(rendered.content)
    }

    /// Render and store the artifact, recording its locator.
    async fn produce_artifact(&self, contract: &Contract) -> Result<String, CollaboratorError> {
        let html = artifact_html(contract);
        let bytes = self.renderer.render(&html).await?;
        let key = format!(
            "{}-{}.{}",
            contract.contract_number,
            contract.status,
            self.renderer.extension()
        );
        let locator = self.artifacts.store(&key, bytes).await?;
        self.shared
            .store
            .set_contract_artifact(contract.id, &locator)
            .await?;
        Ok(locator)
    }

    /// Best-effort artifact run; failures are logged and the contract is
    /// returned as it was.
    async fn attach_artifact(&self, mut contract: Contract) -> Contract {
        match self.produce_artifact(&contract).await {
            Ok(locator) => contract.artifact_ref = Some(locator),
            Err(e) => tracing::warn!(
                contract_id = contract.id,
                error = %e,
                "Contract artifact not produced; it can be regenerated later"
            ),
        }
        contract
    }

    /// Log, publish and audit a hash disagreement, returning the error to
    /// surface.
    async fn integrity_alert(
        &self,
        contract: &Contract,
        expected: String,
        actual: String,
        stage: &str,
        ctx: &RequestContext,
    ) -> CoreError {
        tracing::error!(
            contract_id = contract.id,
            contract_number = %contract.contract_number,
            expected = %expected,
            actual = %actual,
            stage,
            "Contract integrity mismatch"
        );
        let details = json!({
            "contract_number": contract.contract_number,
            "expected": expected,
            "actual": actual,
            "stage": stage,
        });
        self.shared.emit(
            names::CONTRACT_INTEGRITY_ALERT,
            subjects::CONTRACT,
            contract.id,
            None,
            details.clone(),
        );
        self.audit_best_effort(actions::INTEGRITY_ALERT, contract.id, details, ctx)
            .await;
        CoreError::IntegrityMismatch {
            contract_id: contract.id,
            expected,
            actual,
        }
    }

    async fn open_reconciliation(&self, signed: &Contract, cause: &CoreError, ctx: &RequestContext) {
        let reason = format!("project did not move into execution: {cause}");
        tracing::error!(
            contract_id = signed.id,
            project_id = signed.project_id,
            error = %cause,
            "Signed contract needs project reconciliation"
        );
        match self
            .shared
            .store
            .insert_reconciliation_issue(signed.id, signed.project_id, &reason)
            .await
        {
            Ok(issue) => tracing::info!(issue_id = issue.id, "Reconciliation issue opened"),
            Err(e) => tracing::error!(
                contract_id = signed.id,
                error = %e,
                "Failed to store reconciliation issue"
            ),
        }
        let details = json!({
            "contract_number": signed.contract_number,
            "project_id": signed.project_id,
            "reason": reason,
        });
        self.shared.emit(
            names::CONTRACT_RECONCILIATION_REQUIRED,
            subjects::CONTRACT,
            signed.id,
            None,
            details.clone(),
        );
        self.audit_best_effort(actions::RECONCILIATION_REQUIRED, signed.id, details, ctx)
            .await;
    }

    async fn audit_best_effort(
        &self,
        action: &str,
        contract_id: DbId,
        details: serde_json::Value,
        ctx: &RequestContext,
    ) {
        if let Err(e) = self
            .shared
            .audit
            .record(None, action, subjects::CONTRACT, contract_id, None, Some(details), ctx)
            .await
        {
            tracing::error!(contract_id, action, error = %e, "Failed to write audit entry");
        }
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Execution contracts need an approved project; follow-up kinds may also
/// be drawn while the project is executing.
fn project_accepts(kind: ContractKind, status: ProjectStatus) -> bool {
    match kind {
        ContractKind::Execution => status == ProjectStatus::Approved,
        ContractKind::Accountability | ContractKind::Amendment => {
            matches!(status, ProjectStatus::Approved | ProjectStatus::InExecution)
        }
    }
}

/// Lower-cased, trimmed, deduplicated.
fn normalize_channels(channels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(channels.len());
    for channel in channels {
        let c = channel.trim().to_lowercase();
        if !c.is_empty() && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

fn phone_for(channel: &str, applicant: &Applicant) -> Option<String> {
    if channel == "whatsapp" {
        applicant.whatsapp.clone().or_else(|| applicant.phone.clone())
    } else {
        applicant.phone.clone()
    }
}

fn full_address(applicant: &Applicant) -> Option<String> {
    let parts: Vec<&str> = [
        applicant.address.as_deref(),
        applicant.city.as_deref(),
        applicant.state.as_deref(),
        applicant.postal_code.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|p| !p.trim().is_empty())
    .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn artifact_html(contract: &Contract) -> String {
    let hash = integrity::document_hash(&contract.document_fields());
    let signature = match (&contract.signed_at, &contract.signer_ip) {
        (Some(at), Some(ip)) => format!(
            "<p>Assinado eletronicamente em {} a partir do IP {ip}.</p>\n",
            at.format("%d/%m/%Y %H:%M:%S UTC")
        ),
        _ => String::new(),
    };
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"pt-BR\">\n\
         <head><meta charset=\"utf-8\"><title>Contrato {number}</title></head>\n\
         <body>\n\
         <h1>Contrato {number}</h1>\n\
         <main>\n{content}\n</main>\n\
         <footer>\n\
         <p>Valor: {value}</p>\n\
         <p>Vigência: {start} a {end}</p>\n\
         <p>Situação: {status}</p>\n\
         {signature}\
         <p>Hash do documento (SHA-256): <code>{hash}</code></p>\n\
         </footer>\n\
         </body>\n\
         </html>\n",
        number = contract.contract_number,
        content = contract.rendered_content,
        value = money::format_brl(contract.value),
        start = template::format_date(contract.validity_start),
        end = template::format_date(contract.validity_end),
        status = contract.status,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_normalized() {
        let channels = normalize_channels(&[
            " Email ".into(),
            "whatsapp".into(),
            "email".into(),
            "".into(),
        ]);
        assert_eq!(channels, vec!["email".to_string(), "whatsapp".to_string()]);
    }

    #[test]
    fn follow_up_kinds_accept_executing_projects() {
        assert!(project_accepts(ContractKind::Execution, ProjectStatus::Approved));
        assert!(!project_accepts(ContractKind::Execution, ProjectStatus::InExecution));
        assert!(project_accepts(ContractKind::Amendment, ProjectStatus::InExecution));
        assert!(!project_accepts(ContractKind::Accountability, ProjectStatus::Submitted));
    }

    #[test]
    fn sign_request_debug_hides_the_token() {
        let request = SignRequest {
            token: "secret-token".into(),
            signature_payload: serde_json::json!({"name": "Ana"}),
            shown_document_hash: None,
        };
        assert!(!format!("{request:?}").contains("secret-token"));
    }
}
