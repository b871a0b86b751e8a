use thiserror::Error;

use sesame_auth::{AuthzError, TokenError};
use sesame_core::DomainError;

use crate::store::StoreError;

/// Failures surfaced by the auth and role services.
///
/// `Unauthorized` and `InvalidResetToken` deliberately carry no detail: every
/// cause (unknown login, wrong password, bad signature, expiry) looks the same
/// to the caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("validation failed on '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("duplicate value for '{field}'")]
    Duplicate { field: &'static str },

    #[error("invalid or expired token")]
    InvalidResetToken,

    #[error("not found")]
    NotFound,

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl ServiceError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => Self::Validation { field, message },
            DomainError::Duplicate { field } => Self::Duplicate { field },
            DomainError::InvalidId(message) => Self::Validation { field: "id", message },
            DomainError::NotFound => Self::NotFound,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => DomainError::duplicate(field).into(),
            StoreError::NotFound => DomainError::not_found().into(),
            StoreError::Unavailable(_) => Self::Internal(err.into()),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(_: AuthzError) -> Self {
        Self::Forbidden
    }
}

impl From<TokenError> for ServiceError {
    fn from(_: TokenError) -> Self {
        Self::Unauthorized
    }
}
