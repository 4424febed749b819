//! External delivery channels.
//!
//! Transport to applicants (e-mail, WhatsApp, SMS) belongs to an external
//! dispatcher; this crate only hands events to it over a webhook.

pub mod webhook;
