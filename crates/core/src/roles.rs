//! Well-known role name constants.
//!
//! Roles live outside the core; these names are what the transport layer
//! finds in a caller's token and maps onto [`crate::capability::Capabilities`].

pub const ROLE_ADMINISTRATOR: &str = "administrator";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_EVALUATOR: &str = "evaluator";
pub const ROLE_OPERATOR: &str = "operator";
pub const ROLE_APPLICANT: &str = "applicant";

/// Every role the platform recognises.
pub const ALL_ROLES: &[&str] = &[
    ROLE_ADMINISTRATOR,
    ROLE_MANAGER,
    ROLE_EVALUATOR,
    ROLE_OPERATOR,
    ROLE_APPLICANT,
];
