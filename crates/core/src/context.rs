//! Request metadata captured by the transport layer.

use serde::{Deserialize, Serialize};

/// Address recorded when the transport could not resolve one.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Client address and user agent of the request driving an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            user_agent,
        }
    }

    /// The client address, or [`UNKNOWN_IP`].
    pub fn ip_or_unknown(&self) -> &str {
        self.ip.as_deref().unwrap_or(UNKNOWN_IP)
    }
}
