//! User registry: the durable set of people allowed to hold sessions.
//!
//! Every read and write ignores soft-deleted rows, so a removed user behaves
//! exactly like one that never existed while its history stays on disk.

mod registry;
mod validate;

pub use registry::UserRegistry;
pub use validate::{EmailError, normalize_email};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("user {0} not found")]
    UserNotFound(i32),
    #[error("a user with email {0} already exists")]
    UserAlreadyExists(String),
    #[error("email {0} is already used by another user")]
    EmailAlreadyInUse(String),
    #[error(transparent)]
    InvalidEmail(#[from] EmailError),
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}
