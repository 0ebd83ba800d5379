use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{auth::Identity, error::AppError, error::ServiceError, state::SharedState};

const BEARER_PREFIX: &str = "Bearer ";

/// Identity resolved from a mandatory `Authorization: Bearer` header.
pub struct Authenticated(pub Identity);

/// Identity resolved from an optional `Authorization: Bearer` header. A header that is
/// present but invalid is still rejected.
pub struct MaybeAuthenticated(pub Option<Identity>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ServiceError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("malformed authorization header".into()))?;
    value
        .strip_prefix(BEARER_PREFIX)
        .map(|token| Some(token.trim()))
        .ok_or_else(|| ServiceError::Unauthorized("expected a bearer credential".into()))
}

impl FromRequestParts<SharedState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ServiceError::Unauthorized("missing credential".into()))?;
        Ok(Self(state.identity().authenticate(token)?))
    }
}

impl FromRequestParts<SharedState> for MaybeAuthenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(Self(Some(state.identity().authenticate(token)?))),
            None => Ok(Self(None)),
        }
    }
}
