//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Resolves the bearer JWT into a lifecycle
//!   [`Caller`](cultura_core::capability::Caller).
//! - [`client::ClientContext`] -- Client IP and user agent for the audit
//!   trail and signature evidence.

pub mod auth;
pub mod client;
