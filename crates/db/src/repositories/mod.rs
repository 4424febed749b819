pub mod applicant_repo;
pub mod audit_repo;
pub mod call_repo;
pub mod contract_repo;
pub mod document_repo;
pub mod event_repo;
pub mod project_repo;
pub mod reconciliation_repo;

pub use applicant_repo::ApplicantRepo;
pub use audit_repo::AuditEventRepo;
pub use call_repo::CallRepo;
pub use contract_repo::{ContractNumberRepo, ContractRepo, SigningTokenRepo};
pub use document_repo::DocumentRepo;
pub use event_repo::EventRepo;
pub use project_repo::ProjectRepo;
pub use reconciliation_repo::ReconciliationRepo;

use cultura_core::status::StatusId;

/// Database ids for a set of statuses, for `status_id = ANY($n)` binds.
pub(crate) fn status_ids<S>(statuses: &[S]) -> Vec<StatusId>
where
    S: Copy + Into<StatusId>,
{
    statuses.iter().map(|s| (*s).into()).collect()
}
