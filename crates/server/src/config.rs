use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Largest clock-skew allowance accepted for token expiry checks.
pub const MAX_LEEWAY_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// OAuth2 client registration at the identity broker.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Upper bound for the authorization-code exchange round trip.
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,
}

/// Secrets and lifetimes for self-issued session tokens.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    #[serde(default)]
    pub leeway_secs: u64,
    /// Pinned `iss` claim. Derived from `base_url` when absent.
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Public URL of this service, used to build the OAuth callback URI.
    pub base_url: String,
    /// Front-end page that receives the access token after login.
    pub frontend_url: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    pub oauth: OAuthConfig,
    pub tokens: TokenConfig,
}

impl AppConfig {
    /// Redirect URI registered at the broker.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url.trim_end_matches('/'))
    }

    /// Issuer value stamped into and required from every session token.
    pub fn token_issuer(&self) -> String {
        if let Some(issuer) = self.tokens.issuer.as_ref().filter(|i| !i.is_empty()) {
            return issuer.clone();
        }
        let host = Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());
        format!("identity@{host}")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tokens = &self.tokens;
        if tokens.access_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "tokens.access_secret must be at least 32 bytes".into(),
            ));
        }
        if tokens.refresh_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "tokens.refresh_secret must be at least 32 bytes".into(),
            ));
        }
        if tokens.access_secret == tokens.refresh_secret {
            return Err(ConfigError::Validation(
                "tokens.access_secret and tokens.refresh_secret must differ".into(),
            ));
        }
        if tokens.access_ttl_secs == 0 || tokens.refresh_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "token TTLs must be greater than zero".into(),
            ));
        }
        if tokens.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::Validation(format!(
                "tokens.leeway_secs must be at most {MAX_LEEWAY_SECS}"
            )));
        }
        if self.oauth.exchange_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "oauth.exchange_timeout_secs must be > 0".into(),
            ));
        }
        for (name, value) in [
            ("base_url", &self.base_url),
            ("frontend_url", &self.frontend_url),
            ("oauth.auth_url", &self.oauth.auth_url),
            ("oauth.token_url", &self.oauth.token_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Validation(format!("{name} is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_auth_url() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_exchange_timeout_secs() -> u64 {
    10
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching a key path separated by double underscores
/// (e.g. `TOKENS__ACCESS_SECRET`) overrides the file value. The file itself is
/// optional so the service can run purely from the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
