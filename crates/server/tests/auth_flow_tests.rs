//! Login, callback, refresh and gate behaviour over HTTP.

mod common;

use axum::{
    Extension, Router,
    http::{HeaderValue, StatusCode, header},
    routing::get,
};
use axum_test::TestServer;
use common::*;
use identity_service::auth::CurrentUser;
use identity_service::token::{TokenCodec, TokenKind};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

fn cookie(name: &str, value: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{name}={value}")).unwrap()
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn query_of(location: &str) -> HashMap<String, String> {
    Url::parse(location)
        .expect("absolute location")
        .query_pairs()
        .into_owned()
        .collect()
}

/// Run `/auth/login` and return the state cookie it set.
async fn begin_login(app: &TestApp) -> String {
    let response = app.server.get("/auth/login").await;
    response.assert_status(StatusCode::FOUND);
    set_cookie_value(&response, "oauth_state").expect("state cookie")
}

/// Whether the response expires the `oauth_state` cookie.
fn clears_state_cookie(response: &axum_test::TestResponse) -> bool {
    set_cookies(response)
        .iter()
        .any(|c| c.starts_with("oauth_state=;") && c.contains("Max-Age=0"))
}

async fn callback(app: &TestApp, code: &str) -> axum_test::TestResponse {
    let state = begin_login(app).await;
    app.server
        .get("/auth/callback")
        .add_query_param("code", code)
        .add_query_param("state", &state)
        .add_header(header::COOKIE, cookie("oauth_state", &state))
        .await
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn login_redirects_to_broker_with_required_parameters() {
    let app = TestApp::new().await;
    let response = app.server.get("/auth/login").await;
    response.assert_status(StatusCode::FOUND);

    let location = response.header(header::LOCATION);
    let location = location.to_str().unwrap();
    assert!(location.starts_with("https://broker.example/o/oauth2/auth?"));

    let query = query_of(location);
    assert_eq!(query["access_type"], "offline");
    assert_eq!(query["client_id"], "test-client");
    assert_eq!(query["redirect_uri"], "https://id.example.com/auth/callback");
    assert_eq!(query["scope"], "openid email profile");
    assert_eq!(query["response_type"], "code");

    let state = set_cookie_value(&response, "oauth_state").expect("state cookie");
    assert_eq!(query["state"], state);

    let cookies = set_cookies(&response);
    let state_cookie = cookies
        .iter()
        .find(|c| c.starts_with("oauth_state="))
        .unwrap();
    assert!(state_cookie.contains("HttpOnly"));
    assert!(state_cookie.contains("Secure"));
    assert!(state_cookie.contains("Path=/auth"));
}

#[tokio::test]
async fn each_login_gets_its_own_state() {
    let app = TestApp::new().await;
    let first = begin_login(&app).await;
    let second = begin_login(&app).await;
    assert_ne!(first, second);
}

// =============================================================================
// Callback
// =============================================================================

#[tokio::test]
async fn callback_issues_session_for_registered_user() {
    let broker = mock_broker(json!({
        "sub": "1234567890",
        "name": "Jo",
        "email": "user@example.com",
        "picture": "https://x/p.png",
    }))
    .await;
    let app = TestApp::with_broker(broker).await;
    let user = app.resources.users.create("user@example.com").await.unwrap();
    assert_eq!(user.id, 1);

    let response = callback(&app, "mock-code").await;
    response.assert_status(StatusCode::FOUND);

    let location = response.header(header::LOCATION);
    let location = location.to_str().unwrap();
    assert!(location.starts_with(FRONTEND_URL));
    let access_token = query_of(location)["access_token"].clone();

    let verified = app
        .resources
        .tokens
        .verify(TokenKind::Access, &access_token)
        .expect("access token verifies");
    assert_eq!(verified.claims.sub, "1");
    assert_eq!(verified.claims.email.as_deref(), Some("user@example.com"));
    assert_eq!(verified.claims.name.as_deref(), Some("Jo"));
    assert_eq!(verified.claims.picture.as_deref(), Some("https://x/p.png"));
    assert_eq!(verified.claims.iss, ISSUER);

    let cookies = set_cookies(&response);
    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .expect("refresh cookie");
    assert!(refresh.contains("HttpOnly"));
    assert!(refresh.contains("Secure"));
    assert!(refresh.contains("Path=/;"));
    assert!(refresh.contains(&format!("Max-Age={REFRESH_TTL}")));

    let refresh_token = set_cookie_value(&response, "refresh_token").unwrap();
    let verified = app
        .resources
        .tokens
        .verify(TokenKind::Refresh, &refresh_token)
        .unwrap();
    assert_eq!(verified.user_id, 1);
    assert_eq!(verified.claims.email, None);

    // the state cookie is single-use
    assert!(clears_state_cookie(&response));

    let stored = app.resources.users.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Jo"));
    assert_eq!(stored.last_login_sub.as_deref(), Some("1234567890"));
}

#[tokio::test]
async fn callback_rejects_unregistered_email() {
    let app = TestApp::new().await;

    let response = callback(&app, "mock-code").await;
    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "403_01_011");
    assert!(set_cookie_value(&response, "refresh_token").is_none());
}

#[tokio::test]
async fn failed_callback_still_spends_the_state() {
    let app = TestApp::new().await;
    let state = begin_login(&app).await;

    let response = app
        .server
        .get("/auth/callback")
        .add_query_param("code", "mock-code")
        .add_query_param("state", &state)
        .add_header(header::COOKIE, cookie("oauth_state", &state))
        .await;
    response.assert_status_forbidden();
    assert!(clears_state_cookie(&response));

    // a broker failure and a missing code clear it too
    let response = callback(&app, "stale-code").await;
    response.assert_status_internal_server_error();
    assert!(clears_state_cookie(&response));

    let state = begin_login(&app).await;
    let response = app
        .server
        .get("/auth/callback")
        .add_query_param("state", &state)
        .add_header(header::COOKIE, cookie("oauth_state", &state))
        .await;
    response.assert_status_bad_request();
    assert!(clears_state_cookie(&response));
}

#[tokio::test]
async fn callback_matches_email_case_exactly() {
    let app = TestApp::with_broker(mock_broker(broker_claims("Jo@Example.com")).await).await;
    app.resources.users.create("jo@example.com").await.unwrap();

    let response = callback(&app, "mock-code").await;
    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "403_01_011");

    app.resources.users.create("Jo@Example.com").await.unwrap();
    let response = callback(&app, "mock-code").await;
    response.assert_status(StatusCode::FOUND);
}

#[tokio::test]
async fn callback_rejects_soft_deleted_user() {
    let app = TestApp::new().await;
    let user = app.resources.users.create("user@example.com").await.unwrap();
    app.resources.users.soft_delete(user.id).await.unwrap();

    let response = callback(&app, "mock-code").await;
    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "403_01_011");
}

#[tokio::test]
async fn callback_surfaces_rejected_code() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();

    let response = callback(&app, "stale-code").await;
    response.assert_status_internal_server_error();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "500_01_002");
}

#[tokio::test]
async fn callback_reports_incomplete_identity() {
    let mut claims = broker_claims("user@example.com");
    claims.as_object_mut().unwrap().remove("picture");
    let app = TestApp::with_broker(mock_broker(claims).await).await;
    app.resources.users.create("user@example.com").await.unwrap();

    let response = callback(&app, "mock-code").await;
    response.assert_status_internal_server_error();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "500_01_004");
    assert!(body["message"].as_str().unwrap().contains("picture"));
}

#[tokio::test]
async fn callback_rejects_missing_or_mismatched_state() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let state = begin_login(&app).await;

    // no cookie
    let response = app
        .server
        .get("/auth/callback")
        .add_query_param("code", "mock-code")
        .add_query_param("state", &state)
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "400_01_012");

    // cookie from a different login
    let response = app
        .server
        .get("/auth/callback")
        .add_query_param("code", "mock-code")
        .add_query_param("state", &state)
        .add_header(header::COOKIE, cookie("oauth_state", "someone-elses-state"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "400_01_012");
    assert!(!clears_state_cookie(&response));

    // broker never contacted
    let requests = app.broker.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn callback_without_code_is_invalid_request() {
    let app = TestApp::new().await;
    let state = begin_login(&app).await;
    let response = app
        .server
        .get("/auth/callback")
        .add_query_param("state", &state)
        .add_header(header::COOKIE, cookie("oauth_state", &state))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "400_01_013");
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn refresh_then_gate_resolves_same_user() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let refresh_token = app.resources.tokens.issue_refresh(1).unwrap();

    let response = app
        .server
        .post("/auth/refresh")
        .add_header(header::COOKIE, cookie("refresh_token", &refresh_token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let verified = app
        .resources
        .tokens
        .verify(TokenKind::Access, &access_token)
        .unwrap();
    assert_eq!(verified.user_id, 1);

    let response = app
        .server
        .post("/auth/verify")
        .add_header(header::AUTHORIZATION, bearer(&access_token))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    // refresh tokens are not rotated
    assert!(set_cookie_value(&response, "refresh_token").is_none());
}

#[tokio::test]
async fn refresh_requires_valid_cookie() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();

    let response = app.server.post("/auth/refresh").await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_005");

    // an access token is not a refresh token
    let response = app
        .server
        .post("/auth/refresh")
        .add_header(header::COOKIE, cookie("refresh_token", &app.access_token_for(1)))
        .await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_005");
}

#[tokio::test]
async fn refresh_for_deleted_user_is_not_authorized() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let refresh_token = app.resources.tokens.issue_refresh(1).unwrap();
    app.resources.users.soft_delete(1).await.unwrap();

    let response = app
        .server
        .post("/auth/refresh")
        .add_header(header::COOKIE, cookie("refresh_token", &refresh_token))
        .await;
    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "403_01_011");
}

// =============================================================================
// Auth gate
// =============================================================================

#[derive(Clone, Default)]
struct HandlerRuns(Arc<AtomicUsize>);

async fn protected(
    Extension(runs): Extension<HandlerRuns>,
    CurrentUser(caller): CurrentUser,
) -> String {
    runs.0.fetch_add(1, Ordering::SeqCst);
    caller.user_id.to_string()
}

async fn protected_server(app: &TestApp) -> (TestServer, HandlerRuns) {
    let runs = HandlerRuns::default();
    let router = Router::new()
        .route("/protected", get(protected))
        .layer(Extension(runs.clone()))
        .layer(Extension(app.resources.clone()));
    (TestServer::new(router).expect("create test server"), runs)
}

#[tokio::test]
async fn invalid_bearer_token_never_reaches_handler() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let (server, runs) = protected_server(&app).await;

    let response = server
        .get("/protected")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer invalid-token"),
        )
        .await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_006");
    assert!(body["timestamp"].is_string());
    assert_eq!(runs.0.load(Ordering::SeqCst), 0);

    let response = server
        .get("/protected")
        .add_header(header::AUTHORIZATION, bearer(&app.access_token_for(1)))
        .await;
    response.assert_status_ok();
    response.assert_text("1");
    assert_eq!(runs.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_or_non_bearer_header_is_rejected() {
    let app = TestApp::new().await;
    let (server, runs) = protected_server(&app).await;
    let token = app.access_token_for(1);

    let response = server.get("/protected").await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_008");

    for value in [format!("bearer {token}"), format!("Basic {token}"), token.clone()] {
        let response = server
            .get("/protected")
            .add_header(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap())
            .await;
        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "401_01_008", "{value}");
    }
    assert_eq!(runs.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn foreign_issuer_is_rejected() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let (server, runs) = protected_server(&app).await;

    let foreign = TokenCodec::new(
        ACCESS_SECRET,
        REFRESH_SECRET,
        ACCESS_TTL,
        REFRESH_TTL,
        "identity@other-service.example",
    );
    let token = foreign
        .issue(TokenKind::Access, 1, Some(&Default::default()))
        .unwrap();

    let response = server
        .get("/protected")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_007");
    assert_eq!(runs.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let (server, _) = protected_server(&app).await;

    let refresh = app.resources.tokens.issue_refresh(1).unwrap();
    let response = server
        .get("/protected")
        .add_header(header::AUTHORIZATION, bearer(&refresh))
        .await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_006");
}

#[tokio::test]
async fn deleted_user_is_locked_out_immediately() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();
    let (server, runs) = protected_server(&app).await;
    let token = app.access_token_for(1);

    app.resources.users.soft_delete(1).await.unwrap();

    let response = server
        .get("/protected")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "403_01_011");
    assert_eq!(runs.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn verify_endpoint_reports_token_state() {
    let app = TestApp::new().await;
    app.resources.users.create("user@example.com").await.unwrap();

    let response = app
        .server
        .post("/auth/verify")
        .add_header(header::AUTHORIZATION, bearer(&app.access_token_for(1)))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = app.server.post("/auth/verify").await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "401_01_008");
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");

    app.server.method(axum::http::Method::HEAD, "/healthz").await.assert_status_ok();
}
