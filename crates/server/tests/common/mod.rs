//! Shared fixtures: in-memory registry, mock identity broker and a fully
//! wired application.

#![allow(dead_code)]

use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use identity_service::{
    AppResources,
    config::{AppConfig, OAuthConfig, TokenConfig},
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";
pub const ACCESS_TTL: u64 = 900;
pub const REFRESH_TTL: u64 = 86_400;
pub const FRONTEND_URL: &str = "https://app.example.com/login/done";
pub const ISSUER: &str = "identity@id.example.com";

pub async fn create_test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            name TEXT NULL,
            picture TEXT NULL,
            last_login_sub TEXT NULL,
            last_login_at TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT NULL
        );"#,
    ))
    .await
    .expect("create users table");
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE UNIQUE INDEX idx_users_email_live ON users (email) WHERE deleted_at IS NULL;",
    ))
    .await
    .expect("create email index");
    Arc::new(db)
}

pub fn test_config(token_url: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        base_url: "https://id.example.com".into(),
        frontend_url: FRONTEND_URL.into(),
        cors_allowed_origins: vec!["https://app.example.com".into()],
        oauth: OAuthConfig {
            client_id: "test-client".into(),
            client_secret: "test-client-secret".into(),
            auth_url: "https://broker.example/o/oauth2/auth".into(),
            token_url: token_url.into(),
            exchange_timeout_secs: 2,
        },
        tokens: TokenConfig {
            access_secret: ACCESS_SECRET.into(),
            refresh_secret: REFRESH_SECRET.into(),
            access_ttl_secs: ACCESS_TTL,
            refresh_ttl_secs: REFRESH_TTL,
            leeway_secs: 0,
            issuer: None,
        },
    }
}

/// Identity token as the mock broker hands it out: `alg: none`, no signature.
pub fn unsigned_id_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

pub fn broker_claims(email: &str) -> serde_json::Value {
    json!({
        "sub": "broker-subject-1",
        "name": "Test User",
        "email": email,
        "picture": "https://broker.example/avatar.png",
    })
}

/// Mock broker whose token endpoint accepts `mock-code` and returns `claims`.
pub async fn mock_broker(claims: serde_json::Value) -> MockServer {
    let broker = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=mock-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "broker-access-token",
            "token_type": "Bearer",
            "expires_in": 3599,
            "id_token": unsigned_id_token(claims),
        })))
        .with_priority(1)
        .mount(&broker)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&broker)
        .await;
    broker
}

pub struct TestApp {
    pub server: TestServer,
    pub resources: AppResources,
    pub broker: MockServer,
}

impl TestApp {
    pub async fn with_broker(broker: MockServer) -> Self {
        let db = create_test_db().await;
        let config = Arc::new(test_config(&format!("{}/token", broker.uri())));
        let resources = AppResources::new(db, config).expect("resources");
        let server = TestServer::new(identity_service::api::router(resources.clone()))
            .expect("create test server");
        Self {
            server,
            resources,
            broker,
        }
    }

    /// App whose broker reports `user@example.com`.
    pub async fn new() -> Self {
        Self::with_broker(mock_broker(broker_claims("user@example.com")).await).await
    }

    pub fn access_token_for(&self, user_id: i32) -> String {
        let profile = identity_service::token::Profile {
            name: "Test User".into(),
            email: "user@example.com".into(),
            picture: String::new(),
        };
        self.resources
            .tokens
            .issue_access(user_id, &profile)
            .expect("issue access token")
    }
}

/// Every `Set-Cookie` header value on a response.
pub fn set_cookies(response: &axum_test::TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Value of the named cookie among a response's `Set-Cookie` headers.
pub fn set_cookie_value(response: &axum_test::TestResponse, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';').unwrap_or((cookie.as_str(), ""));
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
