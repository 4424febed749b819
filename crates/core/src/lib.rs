//! Pure domain rules for the cultural-grant lifecycle.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! persistence layer, the lifecycle services and the HTTP transport alike.
//! Nothing in here performs I/O.

pub mod applicant;
pub mod audit;
pub mod call;
pub mod capability;
pub mod clock;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod hashing;
pub mod integrity;
pub mod money;
pub mod project;
pub mod roles;
pub mod search;
pub mod signing;
pub mod status;
pub mod tax_id;
pub mod template;
pub mod types;
