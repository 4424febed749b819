//! Lifecycle settings passed explicitly into the services.

use std::time::Duration;

/// Tunables for the grant lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long a signing token stays valid after `send` (default: 24 h).
    pub signing_token_ttl: Duration,
    /// Contract number prefix (default: `CONT`).
    pub contract_number_prefix: String,
    /// Project code prefix (default: `PRJ`).
    pub project_code_prefix: String,
    /// Applicant unique-code prefix (default: `FT1`).
    pub applicant_code_prefix: String,
    /// Retries when a generated number collides with an existing one (default: 3).
    pub numbering_max_retries: u32,
    /// Base URL of the public signing page; the contract id and token are appended.
    pub signing_base_url: String,
}

/// Default signing token lifetime in hours.
pub const DEFAULT_SIGNING_TOKEN_TTL_HOURS: u64 = 24;
/// Default bounded retry count for numbering collisions.
pub const DEFAULT_NUMBERING_MAX_RETRIES: u32 = 3;

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            signing_token_ttl: Duration::from_secs(DEFAULT_SIGNING_TOKEN_TTL_HOURS * 3600),
            contract_number_prefix: "CONT".to_string(),
            project_code_prefix: "PRJ".to_string(),
            applicant_code_prefix: "FT1".to_string(),
            numbering_max_retries: DEFAULT_NUMBERING_MAX_RETRIES,
            signing_base_url: "http://localhost:3000/sign".to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                       |
    /// |---------------------------|-------------------------------|
    /// | `SIGNING_TOKEN_TTL_HOURS` | `24`                          |
    /// | `CONTRACT_NUMBER_PREFIX`  | `CONT`                        |
    /// | `PROJECT_CODE_PREFIX`     | `PRJ`                         |
    /// | `APPLICANT_CODE_PREFIX`   | `FT1`                         |
    /// | `NUMBERING_MAX_RETRIES`   | `3`                           |
    /// | `SIGNING_BASE_URL`        | `http://localhost:3000/sign`  |
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ttl_hours: u64 = std::env::var("SIGNING_TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_SIGNING_TOKEN_TTL_HOURS);

        let numbering_max_retries: u32 = std::env::var("NUMBERING_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_NUMBERING_MAX_RETRIES);

        Self {
            signing_token_ttl: Duration::from_secs(ttl_hours * 3600),
            contract_number_prefix: std::env::var("CONTRACT_NUMBER_PREFIX")
                .unwrap_or(defaults.contract_number_prefix),
            project_code_prefix: std::env::var("PROJECT_CODE_PREFIX")
                .unwrap_or(defaults.project_code_prefix),
            applicant_code_prefix: std::env::var("APPLICANT_CODE_PREFIX")
                .unwrap_or(defaults.applicant_code_prefix),
            numbering_max_retries,
            signing_base_url: std::env::var("SIGNING_BASE_URL")
                .unwrap_or(defaults.signing_base_url),
        }
    }

    /// Token lifetime as a chrono duration for timestamp arithmetic.
    pub fn signing_token_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.signing_token_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(DEFAULT_SIGNING_TOKEN_TTL_HOURS as i64))
    }

    /// Public link an external signer follows.
    pub fn signing_link(&self, contract_id: crate::types::DbId, token: &str) -> String {
        format!(
            "{}/{contract_id}?token={token}",
            self.signing_base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = LifecycleConfig::default();
        assert_eq!(config.signing_token_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.contract_number_prefix, "CONT");
        assert_eq!(config.numbering_max_retries, 3);
        assert_eq!(config.signing_token_ttl_chrono(), chrono::Duration::hours(24));
    }

    #[test]
    fn signing_link_appends_id_and_token() {
        let config = LifecycleConfig {
            signing_base_url: "https://grants.example.org/sign/".into(),
            ..LifecycleConfig::default()
        };
        assert_eq!(
            config.signing_link(12, "abc"),
            "https://grants.example.org/sign/12?token=abc"
        );
    }
}
