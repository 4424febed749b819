//! Wiring for the lifecycle services.

use std::path::PathBuf;
use std::sync::Arc;

use cultura_core::capability::Caller;
use cultura_core::clock::Clock;
use cultura_core::config::LifecycleConfig;
use cultura_core::context::RequestContext;
use cultura_core::error::CoreError;
use cultura_core::types::{DbId, Timestamp};
use cultura_events::{EventBus, LifecycleEvent};
use serde::Serialize;

use crate::applicant::ApplicantRegistry;
use crate::audit::AuditRecorder;
use crate::call::CallLifecycle;
use crate::collaborators::{
    ArtifactStorage, DocumentIndex, DocumentRenderer, HtmlRenderer, LocalArtifactStorage,
    LoggingNotifier, SigningNotifier, StoreDocumentIndex,
};
use crate::contract::ContractLifecycle;
use crate::project::ProjectLifecycle;
use crate::store::{AuditDraft, GrantStore};

/// Handles every service holds.
#[derive(Clone)]
pub struct Shared {
    pub store: Arc<dyn GrantStore>,
    pub events: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<LifecycleConfig>,
    pub audit: AuditRecorder,
}

impl Shared {
    pub fn new(
        store: Arc<dyn GrantStore>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        let audit = AuditRecorder::new(store.clone(), clock.clone());
        Self {
            store,
            events,
            clock,
            config: Arc::new(config),
            audit,
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Audit metadata for a command issued by `caller`.
    pub(crate) fn draft<T: Serialize>(
        &self,
        caller: &Caller,
        ctx: &RequestContext,
        action: &'static str,
        before: Option<&T>,
    ) -> Result<AuditDraft, CoreError> {
        self.audit.draft(caller.user_id, ctx, action, before)
    }

    /// Publish a committed change, stamped with the service clock.
    pub(crate) fn emit(
        &self,
        event_type: &str,
        subject_kind: &str,
        subject_id: DbId,
        actor_id: Option<DbId>,
        payload: serde_json::Value,
    ) {
        self.events.publish(
            LifecycleEvent::new(event_type)
                .with_subject(subject_kind, subject_id)
                .with_actor(actor_id)
                .with_payload(payload)
                .at(self.now()),
        );
    }
}

/// External collaborators the project and contract services call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn DocumentIndex>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub artifacts: Arc<dyn ArtifactStorage>,
    pub notifier: Arc<dyn SigningNotifier>,
}

impl Collaborators {
    /// Store-backed document index, HTML artifacts on local disk and a
    /// notifier that only logs.
    pub fn local(store: Arc<dyn GrantStore>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents: Arc::new(StoreDocumentIndex::new(store)),
            renderer: Arc::new(HtmlRenderer),
            artifacts: Arc::new(LocalArtifactStorage::new(artifacts_dir)),
            notifier: Arc::new(LoggingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SigningNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Every lifecycle service, built over one [`Shared`].
#[derive(Clone)]
pub struct LifecycleServices {
    pub calls: CallLifecycle,
    pub applicants: ApplicantRegistry,
    pub projects: ProjectLifecycle,
    pub contracts: ContractLifecycle,
    pub audit: AuditRecorder,
    shared: Shared,
}

impl LifecycleServices {
    pub fn new(shared: Shared, collaborators: Collaborators) -> Self {
        let projects = ProjectLifecycle::new(shared.clone(), collaborators.documents.clone());
        let contracts = ContractLifecycle::new(
            shared.clone(),
            projects.clone(),
            collaborators.renderer,
            collaborators.artifacts,
            collaborators.notifier,
        );
        Self {
            calls: CallLifecycle::new(shared.clone()),
            applicants: ApplicantRegistry::new(shared.clone()),
            projects,
            contracts,
            audit: shared.audit.clone(),
            shared,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.shared.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.shared.events
    }

    /// Whether the store answers.
    pub async fn health(&self) -> Result<(), CoreError> {
        Ok(self.shared.store.ping().await?)
    }
}
