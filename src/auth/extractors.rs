use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::services::CredentialService;
use crate::error::AppError;

/// Extracts and validates the bearer JWT, returning the user ID.
pub struct AuthUser(pub Uuid);

/// Like [`AuthUser`] for routes that work anonymously: no header yields
/// `None`, a bad token is still rejected.
pub struct MaybeAuthUser(pub Option<Uuid>);

fn bearer(parts: &Parts) -> Option<Result<&str, AppError>> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .ok_or(AppError::InvalidToken);
    Some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    CredentialService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer(parts) else {
            warn!("missing Authorization header");
            return Err(AppError::InvalidToken);
        };
        let claims = CredentialService::from_ref(state).verify_access_token(token?)?;
        Ok(AuthUser(claims.sub))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    CredentialService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer(parts) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let claims = CredentialService::from_ref(state).verify_access_token(token?)?;
                Ok(MaybeAuthUser(Some(claims.sub)))
            }
        }
    }
}
