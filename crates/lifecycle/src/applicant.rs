//! Applicant (proponente) registry.

use cultura_core::applicant::{self, MAX_CODE_ATTEMPTS};
use cultura_core::audit::{actions, subjects};
use cultura_core::capability::Caller;
use cultura_core::context::RequestContext;
use cultura_core::error::CoreError;
use cultura_core::tax_id;
use cultura_core::types::DbId;
use cultura_db::models::applicant::{Applicant, ApplicantFilter, CreateApplicant, UpdateApplicant};
use cultura_events::names;
use serde_json::json;

use crate::services::Shared;
use crate::store::{constraints, StoreError};

#[derive(Clone)]
pub struct ApplicantRegistry {
    shared: Shared,
}

impl ApplicantRegistry {
    pub fn new(shared: Shared) -> Self {
        Self { shared }
    }

    /// Register an applicant.
    ///
    /// Back-office callers (`manage_applicants`) register on behalf of any
    /// user. Everyone else registers themselves: `user_id` is forced to the
    /// caller and a user may own one applicant record.
    pub async fn register(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        input: CreateApplicant,
    ) -> Result<Applicant, CoreError> {
        let mut input = if caller.capabilities.manage_applicants {
            input
        } else {
            let user_id = caller
                .user_id
                .ok_or_else(|| CoreError::PermissionDenied("register an applicant".into()))?;
            if self
                .shared
                .store
                .find_applicant_by_user(user_id)
                .await?
                .is_some()
            {
                return Err(CoreError::Conflict(format!(
                    "user {user_id} already has an applicant record"
                )));
            }
            CreateApplicant {
                user_id: Some(user_id),
                ..input
            }
        };

        applicant::validate_full_name(&input.full_name)?;
        input.full_name = input.full_name.trim().to_string();
        input.tax_id = tax_id::validate(input.legal_kind, &input.tax_id)?;
        input.email = applicant::normalize_email(&input.email)?;
        input.state = input.state.as_deref().map(applicant::normalize_state).transpose()?;
        input.postal_code = input
            .postal_code
            .as_deref()
            .map(applicant::normalize_postal_code)
            .transpose()?;
        input.phone = trimmed(input.phone);
        input.whatsapp = trimmed(input.whatsapp);
        input.address = trimmed(input.address);
        input.city = trimmed(input.city);

        let prefix = &self.shared.config.applicant_code_prefix;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = applicant::generate_code(prefix);
            if self.shared.store.applicant_code_exists(&code).await? {
                tracing::debug!(attempt, "Applicant code taken, drawing another");
                continue;
            }

            let audit = self
                .shared
                .draft::<Applicant>(caller, ctx, actions::CREATE, None)?;
            match self.shared.store.insert_applicant(&input, &code, audit).await {
                Ok(created) => {
                    tracing::info!(
                        applicant_id = created.id,
                        unique_code = %created.unique_code,
                        legal_kind = %created.legal_kind,
                        "Applicant registered"
                    );
                    self.shared.emit(
                        names::APPLICANT_REGISTERED,
                        subjects::APPLICANT,
                        created.id,
                        caller.user_id,
                        json!({
                            "unique_code": created.unique_code,
                            "legal_kind": created.legal_kind,
                            "full_name": created.full_name,
                        }),
                    );
                    return Ok(created);
                }
                Err(StoreError::UniqueViolation(c)) if c == constraints::APPLICANT_CODE => {
                    tracing::debug!(attempt, "Applicant code collided on insert");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::ConcurrencyConflict(format!(
            "no free applicant code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    /// Edit contact data. Only back-office callers may change the status.
    pub async fn update(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        id: DbId,
        mut patch: UpdateApplicant,
    ) -> Result<Applicant, CoreError> {
        let manager = caller.capabilities.manage_applicants;
        caller.require(manager || caller.owns_applicant(id), "edit this applicant")?;
        if patch.status.is_some() && !manager {
            return Err(CoreError::PermissionDenied("change applicant status".into()));
        }
        let current = self.load(id).await?;

        if let Some(name) = &patch.full_name {
            applicant::validate_full_name(name)?;
            patch.full_name = Some(name.trim().to_string());
        }
        patch.email = patch.email.as_deref().map(applicant::normalize_email).transpose()?;
        patch.state = patch.state.as_deref().map(applicant::normalize_state).transpose()?;
        patch.postal_code = patch
            .postal_code
            .as_deref()
            .map(applicant::normalize_postal_code)
            .transpose()?;

        let audit = self
            .shared
            .draft(caller, ctx, actions::UPDATE, Some(&current))?;
        let updated = self
            .shared
            .store
            .update_applicant(id, &patch, audit)
            .await?
            .ok_or(CoreError::NotFound {
                entity: applicant::ENTITY,
                id,
            })?;

        if updated.status != current.status {
            tracing::info!(
                applicant_id = id,
                from = %current.status,
                to = %updated.status,
                "Applicant status changed"
            );
        }
        self.shared.emit(
            names::APPLICANT_UPDATED,
            subjects::APPLICANT,
            id,
            caller.user_id,
            json!({ "status": updated.status }),
        );
        Ok(updated)
    }

    pub async fn get(&self, caller: &Caller, id: DbId) -> Result<Applicant, CoreError> {
        caller.require(
            caller.capabilities.is_staff() || caller.owns_applicant(id),
            "view this applicant",
        )?;
        self.load(id).await
    }

    pub async fn list(
        &self,
        caller: &Caller,
        filter: &ApplicantFilter,
    ) -> Result<Vec<Applicant>, CoreError> {
        caller.require(caller.capabilities.is_staff(), "list applicants")?;
        Ok(self.shared.store.list_applicants(filter).await?)
    }

    /// The applicant record owned by a user, used to resolve callers.
    pub async fn find_for_user(&self, user_id: DbId) -> Result<Option<Applicant>, CoreError> {
        Ok(self.shared.store.find_applicant_by_user(user_id).await?)
    }

    async fn load(&self, id: DbId) -> Result<Applicant, CoreError> {
        self.shared
            .store
            .find_applicant(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: applicant::ENTITY,
                id,
            })
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
