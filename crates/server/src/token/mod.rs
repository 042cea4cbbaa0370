//! Self-issued session tokens.
//!
//! Two token classes exist, each with its own HMAC secret and lifetime:
//!
//! - **Access** tokens are short-lived and embed the caller's display profile
//!   (`name`, `email`, `picture`) so handlers can render identity without a
//!   registry read.
//! - **Refresh** tokens are long-lived, only ever travel in an HTTP-only
//!   cookie and carry nothing but the subject.
//!
//! Tokens are never stored. A token is alive while its signature verifies,
//! its `iss` matches the pinned issuer and `exp` is still in the future.

mod claims;
mod codec;

pub use claims::{Profile, SessionClaims, TokenKind};
pub use codec::{TokenCodec, TokenError, VerifiedToken};
