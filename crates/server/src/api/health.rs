//! Health check endpoint.

use crate::AppResources;
use axum::{Extension, http::StatusCode};

/// Tag for OpenAPI documentation.
pub const SERVICE_TAG: &str = "Service";

/// Reports whether the user registry database answers.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = SERVICE_TAG,
    operation_id = "Health Check",
    summary = "Registry-backed health check",
    description = "Pings the user registry database. Every login and every gated \
                   request reads the registry, so an unreachable database makes the \
                   service unusable and is reported as `503`.\n\n\
                   The identity broker is not contacted.",
    responses(
        (status = 200, description = "Registry reachable", body = str, content_type = "text/plain", example = "ok"),
        (status = 503, description = "Registry unreachable", body = str, content_type = "text/plain", example = "unavailable")
    )
)]
pub async fn health(Extension(resources): Extension<AppResources>) -> (StatusCode, &'static str) {
    match resources.users.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "user registry unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}
