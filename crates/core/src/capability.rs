//! Capability claims resolved by the caller's integration layer.
//!
//! The lifecycle components never look at roles. They receive a [`Caller`]
//! whose [`Capabilities`] were computed once per request and check the one
//! boolean each operation needs.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles;
use crate::types::DbId;

/// Pre-resolved permission booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub manage_calls: bool,
    pub manage_applicants: bool,
    /// Administrative override on projects (edit outside draft, cancel, finish).
    pub manage_projects: bool,
    pub evaluate_projects: bool,
    pub manage_contracts: bool,
    pub send_contracts: bool,
}

impl Capabilities {
    /// Every capability granted.
    pub fn all() -> Self {
        Self {
            manage_calls: true,
            manage_applicants: true,
            manage_projects: true,
            evaluate_projects: true,
            manage_contracts: true,
            send_contracts: true,
        }
    }

    /// Any back-office capability at all; applicants hold none.
    pub fn is_staff(&self) -> bool {
        self.manage_calls
            || self.manage_applicants
            || self.manage_projects
            || self.evaluate_projects
            || self.manage_contracts
            || self.send_contracts
    }

    /// Map a role name onto its capability set. Unknown roles get nothing.
    pub fn for_role(role: &str) -> Self {
        match role {
            roles::ROLE_ADMINISTRATOR => Self::all(),
            roles::ROLE_MANAGER => Self {
                manage_calls: true,
                manage_applicants: true,
                manage_projects: false,
                evaluate_projects: true,
                manage_contracts: true,
                send_contracts: true,
            },
            roles::ROLE_EVALUATOR => Self {
                evaluate_projects: true,
                ..Self::default()
            },
            roles::ROLE_OPERATOR => Self {
                manage_applicants: true,
                send_contracts: true,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// Who is invoking a lifecycle operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Identity from the external user directory. `None` for system jobs.
    pub user_id: Option<DbId>,
    /// The applicant record this identity owns, if any.
    pub applicant_id: Option<DbId>,
    pub capabilities: Capabilities,
}

impl Caller {
    /// The autonomous caller used by background sweeps.
    pub fn system() -> Self {
        Self {
            user_id: None,
            applicant_id: None,
            capabilities: Capabilities::all(),
        }
    }

    pub fn user(user_id: DbId, capabilities: Capabilities) -> Self {
        Self {
            user_id: Some(user_id),
            applicant_id: None,
            capabilities,
        }
    }

    pub fn with_applicant(mut self, applicant_id: DbId) -> Self {
        self.applicant_id = Some(applicant_id);
        self
    }

    /// True when this caller owns the given applicant record.
    pub fn owns_applicant(&self, applicant_id: DbId) -> bool {
        self.applicant_id == Some(applicant_id)
    }

    /// Fail with [`CoreError::PermissionDenied`] unless `allowed` holds.
    pub fn require(&self, allowed: bool, what: &str) -> Result<(), CoreError> {
        if allowed {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(format!(
                "caller may not {what}"
            )))
        }
    }
}
