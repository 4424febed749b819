//! The grant lifecycle services.
//!
//! [`CallLifecycle`], [`ApplicantRegistry`], [`ProjectLifecycle`] and
//! [`ContractLifecycle`] own every status move. Each state-changing command
//! validates against the pure rules in `cultura_core`, persists through a
//! [`GrantStore`] (which writes the audit entry in the same unit of work),
//! then publishes a [`cultura_events::LifecycleEvent`].

pub mod applicant;
pub mod audit;
pub mod call;
pub mod collaborators;
pub mod contract;
pub mod project;
pub mod services;
pub mod store;

pub use applicant::ApplicantRegistry;
pub use audit::AuditRecorder;
pub use call::CallLifecycle;
pub use collaborators::{
    ArtifactStorage, CollaboratorError, DocumentIndex, DocumentRenderer, HtmlRenderer,
    LocalArtifactStorage, LoggingNotifier, SigningNotice, SigningNotifier, StoreDocumentIndex,
};
pub use contract::{
    ContractLifecycle, DeliveryOutcome, IntegrityReport, ProjectFollowUp, SendOutcome, SignOutcome,
    SignRequest, SignedReceipt, SigningView,
};
pub use project::ProjectLifecycle;
pub use services::{Collaborators, LifecycleServices, Shared};
pub use store::memory::MemoryStore;
pub use store::postgres::PgGrantStore;
pub use store::{AuditDraft, ContractNumbering, GrantStore, SignatureCommit, StoreError, StoreResult};
