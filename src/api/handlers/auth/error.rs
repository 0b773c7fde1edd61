//! The only errors that cross the HTTP boundary.
//!
//! Lower layers return their own error types; the auth service maps them here. Anything
//! internal is logged and answered with a generic 500.

use super::{password::PasswordError, store::StoreError, tokens::TokenError};
use axum::{
    http::{header::InvalidHeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Email or password is incorrect";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never told apart.
    #[error("Email or password is incorrect")]
    InvalidCredentials,
    /// Missing, malformed, expired, badly signed or revoked token.
    #[error("Unauthorized")]
    Unauthorized,
    /// The token's principal was deleted after issuance.
    #[error("principal no longer exists")]
    PrincipalGone { on_refresh: bool },
    #[error("Forbidden")]
    Forbidden,
    #[error("Email already exists")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::EmailTaken | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PrincipalGone { on_refresh: true } => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::PrincipalGone { on_refresh: false } => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::PrincipalGone { on_refresh: true } => {
                "Principal for this token could not be found".to_string()
            }
            Self::PrincipalGone { on_refresh: false } => "Unauthorized".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::EmailTaken,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Sign(_) => Self::Internal(err.into()),
            TokenError::Invalid(_) | TokenError::Claim(_) => Self::Unauthorized,
        }
    }
}

impl From<InvalidHeaderValue> for AuthError {
    fn from(err: InvalidHeaderValue) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("auth request failed: {err:#}");
        }
        let status = self.status();
        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}
