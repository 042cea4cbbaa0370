use crate::AppResources;
use crate::error::{AppError, ErrorCode};
use crate::token::{TokenError, TokenKind};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// The registered user behind a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i32,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Axum extractor guarding every authenticated route.
///
/// Requires `Authorization: Bearer <access token>`, verifies the token and
/// then re-reads the user, so a user deleted after issuance is locked out
/// immediately rather than at token expiry.
///
/// ```ignore
/// async fn handler(CurrentUser(caller): CurrentUser) -> impl IntoResponse {
///     format!("hello {}", caller.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub CallerIdentity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                AppError::internal("internal error")
            })?;

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::MissingOrInvalidAuthHeader,
                    "missing or invalid authorization header",
                )
            })?;

        let verified = resources
            .tokens
            .verify(TokenKind::Access, token)
            .map_err(|e| match e {
                TokenError::IssuerMismatch { .. } => {
                    AppError::new(ErrorCode::InvalidTokenIssuer, "invalid token issuer")
                }
                _ => AppError::new(ErrorCode::InvalidAccessToken, "invalid access token"),
            })?;

        let user = resources
            .users
            .find_by_id(verified.user_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                tracing::warn!(user_id = verified.user_id, "token for unknown or deleted user");
                AppError::new(ErrorCode::UserNotAuthorized, "user is not authorized")
            })?;

        Ok(CurrentUser(CallerIdentity {
            user_id: user.id,
            email: user.email,
            name: user.name,
            picture: user.picture,
        }))
    }
}
