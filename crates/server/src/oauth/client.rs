use super::OAuthError;
use crate::config::OAuthConfig;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const SCOPES: &str = "openid email profile";

/// Verified-by-channel identity of the person who completed the broker login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub subject: String,
    pub name: String,
    pub email: String,
    pub picture: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIdentityClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl RawIdentityClaims {
    fn into_claims(self) -> Result<IdentityClaims, OAuthError> {
        fn required(value: Option<String>, field: &'static str) -> Result<String, OAuthError> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(OAuthError::IdentityClaimsIncomplete(field))
        }

        Ok(IdentityClaims {
            subject: required(self.sub, "sub")?,
            name: required(self.name, "name")?,
            email: required(self.email, "email")?,
            picture: required(self.picture, "picture")?,
        })
    }
}

/// OAuth2 client registered at the identity broker.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: Url,
    token_url: Url,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfig, redirect_uri: impl Into<String>) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.exchange_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: Url::parse(&config.auth_url)?,
            token_url: Url::parse(&config.token_url)?,
            redirect_uri: redirect_uri.into(),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Authorization endpoint URL the browser is sent to, carrying `state`.
    pub fn login_url(&self, state: &str) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        url
    }

    /// Trade an authorization code for the caller's identity claims.
    ///
    /// A single attempt bounded by the configured timeout. Nothing is retried.
    #[tracing::instrument(skip_all, fields(token_url = %self.token_url))]
    pub async fn exchange_code(&self, code: &str) -> Result<IdentityClaims, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "broker rejected authorization code");
            return Err(OAuthError::ExchangeFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(format!("unreadable token response: {e}")))?;

        let id_token = tokens.id_token.ok_or_else(|| {
            OAuthError::IdentityTokenMalformed("token response has no id_token".into())
        })?;

        decode_identity_token(&id_token)
    }
}

/// Decode the payload segment of an identity token without checking its
/// signature, then require every profile field to be present.
pub(crate) fn decode_identity_token(id_token: &str) -> Result<IdentityClaims, OAuthError> {
    let mut segments = id_token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => {
            return Err(OAuthError::IdentityTokenMalformed(
                "expected three dot-separated segments".into(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| OAuthError::IdentityTokenMalformed(format!("payload is not base64url: {e}")))?;

    let raw: RawIdentityClaims = serde_json::from_slice(&bytes)
        .map_err(|e| OAuthError::IdentityTokenMalformed(format!("payload is not JSON: {e}")))?;

    raw.into_claims()
}
