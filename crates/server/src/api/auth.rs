//! Login, callback, refresh and verify endpoints (/auth/*).

use crate::AppResources;
use crate::auth::{CurrentUser, cookies};
use crate::error::{AppError, ErrorBody, ErrorCode};
use crate::token::TokenKind;
use axum::{
    Extension, Json,
    extract::Query,
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};

/// Tag for OpenAPI documentation.
pub const AUTH_TAG: &str = "Authentication";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code issued by the broker
    pub code: Option<String>,
    /// State echoed back by the broker; must match the `oauth_state` cookie
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Front-end landing URL with the access token attached as a query parameter.
fn frontend_redirect(frontend_url: &str, access_token: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(frontend_url).map_err(|e| {
        tracing::error!(error = %e, "frontend_url is not a valid URL");
        AppError::internal("internal error")
    })?;
    url.query_pairs_mut()
        .append_pair("access_token", access_token);
    Ok(url)
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/auth/login",
    tag = AUTH_TAG,
    operation_id = "Login",
    summary = "Start a broker login",
    description = "Redirects the browser to the identity broker's consent page. \
                   A fresh random `state` is stored in the `oauth_state` cookie and \
                   must come back unchanged on the callback.",
    responses(
        (status = 302, description = "Redirect to the broker authorization endpoint"),
        (status = 500, description = "Internal error", body = ErrorBody)
    )
)]
pub async fn login(Extension(resources): Extension<AppResources>) -> Result<Response, AppError> {
    let redirect = resources.issuer.begin_login()?;
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, redirect.url.to_string())],
        AppendHeaders([(header::SET_COOKIE, cookies::state_cookie(&redirect.state))]),
    )
        .into_response())
}

#[tracing::instrument(skip(resources, headers, params))]
#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = AUTH_TAG,
    operation_id = "Login Callback",
    summary = "Finish a broker login",
    description = "Checks the `state` against the `oauth_state` cookie, exchanges the \
                   authorization code and, if the email belongs to a registered user, \
                   sets the `refresh_token` cookie and redirects to the front end with \
                   `?access_token=...`.\n\n\
                   Registration is closed: unknown emails get `403_01_011`. Once the \
                   state matches, every response clears the `oauth_state` cookie.",
    params(CallbackParams),
    responses(
        (status = 302, description = "Redirect to the front end with an access token"),
        (status = 400, description = "State mismatch or missing code", body = ErrorBody),
        (status = 403, description = "Email is not a registered user", body = ErrorBody),
        (status = 500, description = "Broker exchange or identity token failure", body = ErrorBody)
    )
)]
pub async fn callback(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let expected = cookies::cookie_value(&headers, cookies::STATE_COOKIE);
    match (expected, params.state.as_deref()) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => {
            return Err(AppError::new(
                ErrorCode::InvalidOAuthState,
                "login state is missing or does not match",
            ));
        }
    }

    // The state is spent from here on, whatever the outcome.
    Ok(match finish_login(&resources, params.code.as_deref()).await {
        Ok(response) => response,
        Err(err) => (
            AppendHeaders([(header::SET_COOKIE, cookies::clear_state_cookie())]),
            err,
        )
            .into_response(),
    })
}

async fn finish_login(resources: &AppResources, code: Option<&str>) -> Result<Response, AppError> {
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::invalid_request("missing authorization code"))?;

    let session = resources.issuer.complete_login(code).await?;
    let location = frontend_redirect(&resources.config.frontend_url, &session.access_token)?;
    let max_age = resources.tokens.ttl(TokenKind::Refresh).whole_seconds();

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
        AppendHeaders([
            (
                header::SET_COOKIE,
                cookies::refresh_cookie(&session.refresh_token, max_age),
            ),
            (header::SET_COOKIE, cookies::clear_state_cookie()),
        ]),
    )
        .into_response())
}

#[tracing::instrument(skip(resources, headers))]
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = AUTH_TAG,
    operation_id = "Refresh Access Token",
    summary = "Mint a new access token",
    description = "Reads the `refresh_token` cookie and returns a fresh access token. \
                   The refresh token is not rotated.",
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Refresh cookie missing or invalid", body = ErrorBody),
        (status = 403, description = "User no longer registered", body = ErrorBody)
    )
)]
pub async fn refresh(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let token = cookies::cookie_value(&headers, cookies::REFRESH_COOKIE);
    let access_token = resources.issuer.refresh(token).await?;
    Ok(Json(AccessTokenResponse { access_token }))
}

#[tracing::instrument(skip_all, fields(user_id = caller.user_id))]
#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = AUTH_TAG,
    operation_id = "Verify Access Token",
    summary = "Check that an access token is accepted",
    security(("Authorization" = [])),
    responses(
        (status = 204, description = "Token is valid and its user is registered"),
        (status = 401, description = "Missing, invalid or foreign token", body = ErrorBody),
        (status = 403, description = "User no longer registered", body = ErrorBody)
    )
)]
pub async fn verify(CurrentUser(caller): CurrentUser) -> StatusCode {
    StatusCode::NO_CONTENT
}
