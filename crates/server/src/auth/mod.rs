//! Login, refresh and request authentication on top of the token codec,
//! the broker client and the user registry.

pub mod cookies;
mod gate;
mod service;

pub use gate::{CallerIdentity, CurrentUser};
pub use service::{CredentialIssuer, IssuedSession, LoginRedirect};

use crate::error::{AppError, ErrorCode};
use crate::oauth::OAuthError;
use crate::token::TokenError;
use crate::users::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error("refresh token is missing or invalid")]
    InvalidRefreshToken,
    #[error("user is not authorized")]
    UserNotAuthorized,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to issue session token: {0}")]
    Signing(#[from] TokenError),
    #[error("failed to generate login state: {0}")]
    Random(#[from] getrandom::Error),
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::ExchangeFailed(_) => {
                tracing::error!(error = %err, "broker exchange failed");
                AppError::new(
                    ErrorCode::OAuthExchangeFailed,
                    "failed to exchange authorization code",
                )
            }
            OAuthError::IdentityTokenMalformed(_) => {
                tracing::error!(error = %err, "broker identity token unreadable");
                AppError::new(
                    ErrorCode::IdentityTokenMalformed,
                    "identity token is malformed",
                )
            }
            OAuthError::IdentityClaimsIncomplete(field) => AppError::new(
                ErrorCode::IdentityClaimsIncomplete,
                format!("identity token is missing the {field} claim"),
            ),
            OAuthError::Endpoint(_) | OAuthError::Client(_) => {
                tracing::error!(error = %err, "broker client misconfigured");
                AppError::internal("internal error")
            }
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UserNotFound(id) => {
                AppError::new(ErrorCode::UserNotFound, format!("user {id} not found"))
            }
            RegistryError::UserAlreadyExists(_) => {
                AppError::new(ErrorCode::UserAlreadyExists, err.to_string())
            }
            RegistryError::EmailAlreadyInUse(_) => {
                AppError::new(ErrorCode::EmailAlreadyInUse, err.to_string())
            }
            RegistryError::InvalidEmail(e) => AppError::invalid_request(e.to_string()),
            RegistryError::Db(e) => {
                tracing::error!(error = %e, "registry query failed");
                AppError::internal("internal error")
            }
        }
    }
}

impl From<AuthFlowError> for AppError {
    fn from(err: AuthFlowError) -> Self {
        match err {
            AuthFlowError::OAuth(e) => e.into(),
            AuthFlowError::InvalidRefreshToken => {
                AppError::new(ErrorCode::InvalidRefreshToken, "invalid refresh token")
            }
            AuthFlowError::UserNotAuthorized => {
                AppError::new(ErrorCode::UserNotAuthorized, "user is not authorized")
            }
            AuthFlowError::Registry(e) => e.into(),
            AuthFlowError::Signing(e) => {
                tracing::error!(error = %e, "token signing failed");
                AppError::internal("internal error")
            }
            AuthFlowError::Random(e) => {
                tracing::error!(error = %e, "random source unavailable");
                AppError::internal("internal error")
            }
        }
    }
}
