//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use cultura_core::capability::{Caller, Capabilities};
use cultura_core::error::CoreError;
use cultura_core::roles::ROLE_APPLICANT;
use cultura_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// The role is mapped onto capability booleans once, here. Callers with the
/// applicant role also get the applicant record they own attached, so the
/// lifecycle services can check ownership.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's id in the external directory (from `claims.sub`).
    pub user_id: DbId,
    /// The user's role name.
    pub role: String,
    /// The resolved lifecycle caller.
    pub caller: Caller,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token refused");
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        let mut caller = Caller::user(claims.sub, Capabilities::for_role(&claims.role));
        if claims.role == ROLE_APPLICANT {
            if let Some(applicant) = state.services.applicants.find_for_user(claims.sub).await? {
                caller = caller.with_applicant(applicant.id);
            }
        }

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
            caller,
        })
    }
}
