//! OpenAPI/Utoipa configuration.

use crate::api::{auth::AUTH_TAG, health::SERVICE_TAG, users::USERS_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let bearer = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .bearer_format("JWT")
            .description(Some(
                "Access token from the `/auth/callback` redirect or `/auth/refresh`.",
            ))
            .build();
        components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Identity Service API",
        version = "1.0.0",
        description = "Broker-backed login and session tokens for registered users."
    ),
    tags(
        (name = SERVICE_TAG, description = "Service status"),
        (name = AUTH_TAG, description = "Login, token refresh and token checks"),
        (name = USERS_TAG, description = "User registry management")
    )
)]
pub struct ApiDoc;
