//! Bearer-token verification.
//!
//! Identities come from the external user directory, which signs HS256
//! tokens carrying the user id and one role name. This side verifies the
//! signature, expiry and (when configured) issuer, and refuses roles it does
//! not know. [`generate_access_token`] mints tokens the same way for
//! operators' tooling and tests.

use cultura_core::roles::ALL_ROLES;
use cultura_core::types::DbId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims the directory puts in every token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The user's id in the external directory.
    pub sub: DbId,
    /// One of [`ALL_ROLES`].
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default)]
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret with the directory.
    pub secret: String,
    /// Expected `iss` claim. Unset accepts any issuer.
    pub issuer: Option<String>,
    /// Lifetime of tokens minted by [`generate_access_token`].
    pub access_token_expiry_mins: i64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;

impl JwtConfig {
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ISSUER`             | no       | unset   |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `15`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let issuer = std::env::var("JWT_ISSUER")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        Self {
            secret,
            issuer,
            access_token_expiry_mins,
        }
    }
}

/// Why a bearer token was refused.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// Mint a token for `user_id` holding `role`, stamped with the configured
/// issuer.
pub fn generate_access_token(
    user_id: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: now + config.access_token_expiry_mins * 60,
        iat: now,
        iss: config.issuer.clone(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify `token` and return its claims.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?
    .claims;

    if !ALL_ROLES.contains(&claims.role.as_str()) {
        return Err(TokenError::UnknownRole(claims.role));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config(secret: &str, issuer: Option<&str>) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            issuer: issuer.map(str::to_string),
            access_token_expiry_mins: 15,
        }
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn minted_token_round_trips() {
        let cfg = config("test-secret-that-is-long-enough-for-hmac", Some("directory"));
        let token = generate_access_token(42, "evaluator", &cfg).unwrap();

        let claims = validate_token(&token, &cfg).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "evaluator");
        assert_eq!(claims.iss.as_deref(), Some("directory"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = config("test-secret-that-is-long-enough-for-hmac", None);
        // Well beyond the default 60-second leeway.
        let now = chrono::Utc::now().timestamp();
        let token = sign(
            &Claims {
                sub: 1,
                role: "applicant".to_string(),
                exp: now - 300,
                iat: now - 600,
                iss: None,
                jti: String::new(),
            },
            &cfg.secret,
        );

        assert_matches!(validate_token(&token, &cfg), Err(TokenError::Rejected(_)));
    }

    #[test]
    fn foreign_secret_or_issuer_is_rejected() {
        let ours = config("secret-alpha", Some("directory"));

        let token = generate_access_token(1, "applicant", &config("secret-bravo", Some("directory")))
            .unwrap();
        assert_matches!(validate_token(&token, &ours), Err(TokenError::Rejected(_)));

        let token =
            generate_access_token(1, "applicant", &config("secret-alpha", Some("elsewhere")))
                .unwrap();
        assert_matches!(validate_token(&token, &ours), Err(TokenError::Rejected(_)));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let cfg = config("secret-alpha", None);
        let token = generate_access_token(7, "superuser", &cfg).unwrap();

        assert_matches!(
            validate_token(&token, &cfg),
            Err(TokenError::UnknownRole(role)) if role == "superuser"
        );
    }
}
