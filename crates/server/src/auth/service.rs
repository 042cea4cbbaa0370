use super::AuthFlowError;
use crate::oauth::{OAuthClient, generate_state};
use crate::token::{Profile, TokenCodec, TokenKind};
use crate::users::{RegistryError, UserRegistry};
use std::sync::Arc;
use url::Url;

/// Where to send the browser to start a login, and the state it must bring
/// back.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: Url,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: String,
}

/// Turns broker logins and refresh tokens into session tokens.
///
/// Registration is closed: only emails already provisioned in the registry
/// can complete a login.
#[derive(Clone)]
pub struct CredentialIssuer {
    oauth: OAuthClient,
    tokens: Arc<TokenCodec>,
    users: UserRegistry,
}

impl CredentialIssuer {
    pub fn new(oauth: OAuthClient, tokens: Arc<TokenCodec>, users: UserRegistry) -> Self {
        Self {
            oauth,
            tokens,
            users,
        }
    }

    pub fn begin_login(&self) -> Result<LoginRedirect, AuthFlowError> {
        let state = generate_state()?;
        Ok(LoginRedirect {
            url: self.oauth.login_url(&state),
            state,
        })
    }

    /// Exchange the broker's authorization code and open a session for the
    /// matching registered user.
    #[tracing::instrument(skip_all)]
    pub async fn complete_login(&self, code: &str) -> Result<IssuedSession, AuthFlowError> {
        let identity = self.oauth.exchange_code(code).await?;

        let user = self
            .users
            .find_by_email(&identity.email)
            .await?
            .ok_or_else(|| {
                tracing::warn!("login attempt by unregistered email");
                AuthFlowError::UserNotAuthorized
            })?;

        self.users
            .record_login(user.id, &identity.name, &identity.picture, &identity.subject)
            .await
            .map_err(|e| match e {
                RegistryError::UserNotFound(_) => AuthFlowError::UserNotAuthorized,
                other => other.into(),
            })?;

        let profile = Profile {
            name: identity.name,
            email: identity.email,
            picture: identity.picture,
        };
        let access_token = self.tokens.issue(TokenKind::Access, user.id, Some(&profile))?;
        let refresh_token = self.tokens.issue(TokenKind::Refresh, user.id, None)?;

        tracing::info!(user_id = user.id, "login completed");
        Ok(IssuedSession {
            user_id: user.id,
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from a refresh token. The refresh token itself
    /// is left untouched and stays valid until it expires.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AuthFlowError> {
        let token = refresh_token.ok_or(AuthFlowError::InvalidRefreshToken)?;
        let verified = self
            .tokens
            .verify(TokenKind::Refresh, token)
            .map_err(|e| {
                tracing::debug!(error = %e, "refresh token rejected");
                AuthFlowError::InvalidRefreshToken
            })?;

        let user = self
            .users
            .find_by_id(verified.user_id)
            .await?
            .ok_or(AuthFlowError::UserNotAuthorized)?;

        let profile = Profile {
            name: user.name.unwrap_or_default(),
            email: user.email,
            picture: user.picture.unwrap_or_default(),
        };
        Ok(self.tokens.issue(TokenKind::Access, user.id, Some(&profile))?)
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }
}
