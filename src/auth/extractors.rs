use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::authorize::require_admin;
use super::claims::Claims;
use super::jwt::JwtKeys;
use super::repo_types::User;
use crate::error::AppError;
use crate::state::AppState;

/// Verified access-token claims of the caller.
pub struct AuthUser(pub Claims);

/// Caller whose current directory record carries the admin flag.
pub struct AdminUser(pub User);

/// `Ok(None)` when no Authorization header is present.
fn bearer_claims(parts: &Parts, keys: &JwtKeys) -> Result<Option<Claims>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    // Expect "Bearer <token>"
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let claims = keys.verify_access(token).map_err(|e| {
        warn!(error = %e, "access token rejected");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;
    Ok(Some(claims))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        bearer_claims(parts, &keys)?
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, &state.keys)?;
        let user = require_admin(state.directory.as_ref(), claims.as_ref()).await?;
        Ok(AdminUser(user))
    }
}
