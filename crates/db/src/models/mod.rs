pub mod applicant;
pub mod audit;
pub mod call;
pub mod contract;
pub mod document;
pub mod event;
pub mod project;
pub mod reconciliation;
