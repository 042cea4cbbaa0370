//! Client side of the OAuth2 authorization-code flow against the identity
//! broker.
//!
//! The broker is trusted through its client-authenticated token endpoint, so
//! the identity token returned there is decoded without checking its
//! signature.

mod client;
mod state;

pub use client::{IdentityClaims, OAuthClient};
pub use state::generate_state;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("identity token is malformed: {0}")]
    IdentityTokenMalformed(String),
    #[error("identity token is missing the {0} claim")]
    IdentityClaimsIncomplete(&'static str),
    #[error("invalid broker endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
