//! HTTP-facing error taxonomy.
//!
//! Every failure leaves the service as the same JSON envelope:
//! `{"code": "401_01_006", "message": "...", "timestamp": "<RFC3339>"}`.
//! Codes follow `<http status>_<service id>_<serial>` and the response status
//! is always taken from the code's numeric prefix.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UserNotFound,
    OAuthExchangeFailed,
    IdentityTokenMalformed,
    IdentityClaimsIncomplete,
    InvalidRefreshToken,
    InvalidAccessToken,
    InvalidTokenIssuer,
    MissingOrInvalidAuthHeader,
    UserAlreadyExists,
    EmailAlreadyInUse,
    UserNotAuthorized,
    InvalidOAuthState,
    InvalidRequest,
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 14] = [
        ErrorCode::UserNotFound,
        ErrorCode::OAuthExchangeFailed,
        ErrorCode::IdentityTokenMalformed,
        ErrorCode::IdentityClaimsIncomplete,
        ErrorCode::InvalidRefreshToken,
        ErrorCode::InvalidAccessToken,
        ErrorCode::InvalidTokenIssuer,
        ErrorCode::MissingOrInvalidAuthHeader,
        ErrorCode::UserAlreadyExists,
        ErrorCode::EmailAlreadyInUse,
        ErrorCode::UserNotAuthorized,
        ErrorCode::InvalidOAuthState,
        ErrorCode::InvalidRequest,
        ErrorCode::InternalError,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "404_01_001",
            ErrorCode::OAuthExchangeFailed => "500_01_002",
            ErrorCode::IdentityTokenMalformed => "500_01_003",
            ErrorCode::IdentityClaimsIncomplete => "500_01_004",
            ErrorCode::InvalidRefreshToken => "401_01_005",
            ErrorCode::InvalidAccessToken => "401_01_006",
            ErrorCode::InvalidTokenIssuer => "401_01_007",
            ErrorCode::MissingOrInvalidAuthHeader => "401_01_008",
            ErrorCode::UserAlreadyExists => "409_01_009",
            ErrorCode::EmailAlreadyInUse => "409_01_010",
            ErrorCode::UserNotAuthorized => "403_01_011",
            ErrorCode::InvalidOAuthState => "400_01_012",
            ErrorCode::InvalidRequest => "400_01_013",
            ErrorCode::InternalError => "500_01_014",
        }
    }

    /// HTTP status encoded in the code's three-digit prefix.
    pub fn status(self) -> StatusCode {
        self.as_str()
            .get(..3)
            .and_then(|prefix| prefix.parse::<u16>().ok())
            .and_then(|n| StatusCode::from_u16(n).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform error body returned on every failure path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// `<status>_<service>_<serial>`, e.g. `401_01_006`
    pub code: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code.as_str().to_string(),
            message: self.message.clone(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        } else {
            tracing::warn!(code = %self.code, message = %self.message, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
