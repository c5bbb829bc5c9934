use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{
    auth::{jwt::JwtKeys, repo_types::CurrentUser},
    error::AppError,
    state::AppState,
};

const NO_TOKEN: &str = "Not authorized, no token";
const TOKEN_FAILED: &str = "Not authorized, token failed";
const USER_GONE: &str = "Not authorized, user not found";

/// Authenticated caller. The bearer token is checked and its subject resolved
/// against the credential store on every request.
pub struct AuthUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(NO_TOKEN.into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized(NO_TOKEN.into()))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthorized(TOKEN_FAILED.into())
        })?;

        let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            AppError::Unauthorized(USER_GONE.into())
        })?;

        Ok(AuthUser(CurrentUser::from(&user)))
    }
}
