use super::claims::{Profile, SessionClaims, TokenKind};
use crate::config::AppConfig;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::collections::HashSet;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed or its signature does not verify")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token issuer {found:?} does not match this service")]
    IssuerMismatch { found: String },
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// A token whose signature, issuer and expiry have all been checked.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: i32,
    pub claims: SessionClaims,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl KeyPair {
    fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }
}

/// Signs and verifies session tokens with HS256.
///
/// Access and refresh tokens use separate secrets. Independently of the
/// secret, every token's `iss` must equal the pinned issuer.
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    leeway_secs: i64,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: u64,
        refresh_ttl_secs: u64,
        issuer: impl Into<String>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked against our own clock in `verify_at` so the boundary is exact
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "iss".to_string(), "sub".to_string()]);

        Self {
            access: KeyPair::new(access_secret, access_ttl_secs),
            refresh: KeyPair::new(refresh_secret, refresh_ttl_secs),
            issuer: issuer.into(),
            leeway_secs: 0,
            validation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let tokens = &config.tokens;
        Self::new(
            &tokens.access_secret,
            &tokens.refresh_secret,
            tokens.access_ttl_secs,
            tokens.refresh_ttl_secs,
            config.token_issuer(),
        )
        .with_leeway(tokens.leeway_secs)
    }

    /// Tolerate `exp` being up to `secs` in the past. Zero by default.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = i64::try_from(secs).unwrap_or(0);
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self, kind: TokenKind) -> time::Duration {
        time::Duration::seconds(self.keys(kind).ttl_secs)
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue_access(&self, user_id: i32, profile: &Profile) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, user_id, Some(profile))
    }

    pub fn issue_refresh(&self, user_id: i32) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, user_id, None)
    }

    pub fn issue(
        &self,
        kind: TokenKind,
        user_id: i32,
        profile: Option<&Profile>,
    ) -> Result<String, TokenError> {
        self.issue_at(kind, user_id, profile, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Issue a token as if the current time were `now` (unix seconds).
    ///
    /// Refresh tokens never carry a profile, even when one is passed.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        user_id: i32,
        profile: Option<&Profile>,
        now: i64,
    ) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let profile = match kind {
            TokenKind::Access => profile,
            TokenKind::Refresh => None,
        };
        let claims = SessionClaims::new(user_id, &self.issuer, now, keys.ttl_secs, profile);
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(TokenError::Signing)
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(kind, token, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verify a token as if the current time were `now` (unix seconds).
    ///
    /// Order of checks: signature and structure, then issuer, then expiry,
    /// then the subject must be a positive integer.
    pub fn verify_at(
        &self,
        kind: TokenKind,
        token: &str,
        now: i64,
    ) -> Result<VerifiedToken, TokenError> {
        let data = decode::<SessionClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(kind = %kind, error = %e, "token rejected");
                TokenError::Invalid
            })?;
        let claims = data.claims;

        if claims.iss != self.issuer {
            return Err(TokenError::IssuerMismatch {
                found: claims.iss,
            });
        }

        if claims.exp.saturating_add(self.leeway_secs) <= now {
            return Err(TokenError::Expired);
        }

        let user_id = claims
            .sub
            .parse::<i32>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(TokenError::Invalid)?;

        Ok(VerifiedToken { user_id, claims })
    }
}
