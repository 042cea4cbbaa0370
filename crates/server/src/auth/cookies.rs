//! `Set-Cookie` builders and a minimal `Cookie` header reader.

use axum::http::{HeaderMap, header};

pub const REFRESH_COOKIE: &str = "refresh_token";
pub const STATE_COOKIE: &str = "oauth_state";

/// Login attempts must come back from the broker within this window.
pub const STATE_TTL_SECS: i64 = 600;

/// Long-lived refresh credential, readable by the server only.
pub fn refresh_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{REFRESH_COOKIE}={token}; Path=/; HttpOnly; Secure; Max-Age={max_age_secs}")
}

/// CSRF state bound to one login attempt. Scoped to `/auth` and sent on the
/// top-level redirect back from the broker, hence `SameSite=Lax`.
pub fn state_cookie(state: &str) -> String {
    format!("{STATE_COOKIE}={state}; Path=/auth; HttpOnly; Secure; SameSite=Lax; Max-Age={STATE_TTL_SECS}")
}

pub fn clear_state_cookie() -> String {
    format!("{STATE_COOKIE}=; Path=/auth; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

/// Value of the first non-empty cookie called `name` across all `Cookie`
/// headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| key.trim() == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim())
}
