//! Applicant (proponente) rules: registration fields and unique codes.

use rand::Rng;
use validator::ValidateEmail;

use crate::error::CoreError;
use crate::status::ApplicantStatus;

/// Entity name used in errors and audit records.
pub const ENTITY: &str = "Applicant";

/// Number of random digits after the code prefix.
pub const CODE_DIGITS: usize = 6;

/// How many fresh codes to try before giving up on a collision streak.
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Generate a candidate unique code such as `FT1048213`.
///
/// Uniqueness is enforced by the store; callers retry on collision.
pub fn generate_code(prefix: &str) -> String {
    let n: u32 = rand::rng().random_range(0..10u32.pow(CODE_DIGITS as u32));
    format!("{prefix}{n:0width$}", width = CODE_DIGITS)
}

/// Only active applicants may open projects.
pub fn can_create_projects(status: ApplicantStatus) -> bool {
    status == ApplicantStatus::Active
}

pub fn validate_full_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("full_name", "must not be empty"));
    }
    if trimmed.chars().count() > 255 {
        return Err(CoreError::validation(
            "full_name",
            "must be at most 255 characters",
        ));
    }
    Ok(())
}

/// Lower-cased, trimmed e-mail address if it is well formed.
pub fn normalize_email(email: &str) -> Result<String, CoreError> {
    let normalized = email.trim().to_lowercase();
    if normalized.validate_email() {
        Ok(normalized)
    } else {
        Err(CoreError::validation("email", "is not a valid e-mail address"))
    }
}

/// Two-letter state abbreviation, upper-cased.
pub fn normalize_state(state: &str) -> Result<String, CoreError> {
    let upper = state.trim().to_uppercase();
    if upper.len() == 2 && upper.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(upper)
    } else {
        Err(CoreError::validation("state", "must be a two-letter abbreviation"))
    }
}

/// Eight-digit postal code, punctuation stripped.
pub fn normalize_postal_code(code: &str) -> Result<String, CoreError> {
    let digits: String = code.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 8 {
        Ok(digits)
    } else {
        Err(CoreError::validation("postal_code", "must have 8 digits"))
    }
}
