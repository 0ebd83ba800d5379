use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    state::{game::GameType, state_machine::GamePhase, state_machine::InvalidTransition},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Missing or unverifiable credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Valid credential lacking the required role or scope.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Phase transition not reachable from the current phase.
    #[error("invalid phase: {0}")]
    InvalidPhase(String),
    /// Operation requires a different phase than the game is in.
    #[error("game is in {actual:?}, operation requires {expected:?}")]
    PhaseMismatch {
        expected: GamePhase,
        actual: GamePhase,
    },
    /// Entry kind does not match the game type.
    #[error("entry kind {expected:?} does not match {actual:?} game")]
    WrongGameType {
        expected: GameType,
        actual: GameType,
    },
    /// Player is ahead of the slowest peer and must wait.
    #[error("wait for the other players to finish round {round}")]
    TooFast { round: usize },
    /// Name or nickname already used by another player of the game.
    #[error("duplicate: {0}")]
    DuplicateName(String),
    /// Lost a race against a concurrent writer; re-fetch state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Unexpected failure inside the backend.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => {
                ServiceError::NotFound(format!("{entity} `{id}` not found"))
            }
            StorageError::Conflict { message } => ServiceError::Conflict(message),
            StorageError::Duplicate { field, value } => {
                ServiceError::DuplicateName(format!("{field} `{value}` is already taken"))
            }
            err @ StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidPhase(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated caller lacks permission.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state; `code` tells clients which rule was violated.
    #[error("conflict: {message}")]
    Conflict {
        code: &'static str,
        message: String,
    },
    /// Service unavailable or degraded; safe to retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn conflict(code: &'static str, err: ServiceError) -> Self {
        AppError::Conflict {
            code,
            message: err.to_string(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict { code, .. } => code,
            AppError::ServiceUnavailable(_) => "store_unavailable",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Internal(message) => AppError::Internal(message),
            err @ ServiceError::InvalidPhase(_) => AppError::conflict("invalid_phase", err),
            err @ ServiceError::PhaseMismatch { .. } => AppError::conflict("phase_mismatch", err),
            err @ ServiceError::WrongGameType { .. } => {
                AppError::conflict("wrong_game_type", err)
            }
            err @ ServiceError::TooFast { .. } => AppError::conflict("too_fast", err),
            err @ ServiceError::DuplicateName(_) => AppError::conflict("duplicate_name", err),
            err @ ServiceError::Conflict(_) => AppError::conflict("conflict", err),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
