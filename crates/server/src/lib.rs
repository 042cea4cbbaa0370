//! Identity service: signs users in through an external OAuth2 broker and
//! issues its own short-lived access tokens and long-lived refresh tokens.
//!
//! Only users provisioned in the registry can log in. Every authenticated
//! request is checked against the registry again, so deleting a user revokes
//! their access immediately.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::CredentialIssuer;
use crate::config::AppConfig;
use crate::oauth::{OAuthClient, OAuthError};
use crate::token::TokenCodec;
use crate::users::UserRegistry;

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth;
pub mod token;
pub mod users;

/// Everything a request handler needs, shared through an axum `Extension`.
#[derive(Clone)]
pub struct AppResources {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenCodec>,
    pub users: UserRegistry,
    pub issuer: CredentialIssuer,
}

impl AppResources {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Result<Self, OAuthError> {
        let tokens = Arc::new(TokenCodec::from_config(&config));
        let users = UserRegistry::new(db);
        let oauth = OAuthClient::new(&config.oauth, config.callback_url())?;
        let issuer = CredentialIssuer::new(oauth, tokens.clone(), users.clone());

        Ok(Self {
            config,
            tokens,
            users,
            issuer,
        })
    }
}
