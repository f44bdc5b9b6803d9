use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::jwt::{self, TokenKind};
use crate::state::AppState;
use crate::utils::error::AppError;

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header. Handlers that take this extractor reject unauthenticated
/// requests with 401 before running.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::AuthError("Authentication credentials were not provided".into())
        })?;

        let claims = jwt::validate(&state.config.jwt, token, TokenKind::Access)?;
        Ok(AuthUser(claims.sub))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
