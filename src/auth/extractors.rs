use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::basic::{self, Credential};
use crate::{error::AppError, state::AppState};

/// Subject of a valid bearer token.
pub struct AuthUser(pub Uuid);

/// Credential decoded from a `Basic` authorization header.
pub struct BasicAuth(pub Credential);

fn authorization(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// `Bearer <token>` with exactly one space and a non-empty token.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = authorization(parts)
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?;
        let token = bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("invalid auth scheme".into()))?;

        match state.tokens.validate(token) {
            Ok(subject) => Ok(AuthUser(subject)),
            Err(e) => {
                warn!(reason = %e, "bearer token rejected");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BasicAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = authorization(parts)
            .ok_or_else(|| AppError::Validation("missing Authorization header".into()))?;
        Ok(BasicAuth(basic::decode(header)?))
    }
}
