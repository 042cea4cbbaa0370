use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Display attributes denormalized into access tokens at issuance time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub picture: String,
}

/// Claim set shared by both token classes.
///
/// The subject stays a decimal string on the wire; callers get the parsed
/// integer id from [`super::VerifiedToken`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl SessionClaims {
    pub(crate) fn new(
        user_id: i32,
        issuer: &str,
        issued_at: i64,
        ttl_secs: i64,
        profile: Option<&Profile>,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            name: profile.map(|p| p.name.clone()),
            email: profile.map(|p| p.email.clone()),
            picture: profile.map(|p| p.picture.clone()),
        }
    }
}
