//! OpenAPI documentation for the `/auth/v1` API, served at `/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, auth};

/// Security scheme for gated endpoints (access token as bearer).
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from `/auth/v1/login` or `/auth/v1/refresh`:\n\n\
                            ```\nAuthorization: Bearer ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::refresh,
        api::handlers::auth::is_admin,
        api::handlers::auth::validate_session,
        api::handlers::auth::current_session,
        api::handlers::health::healthz,
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::RegisterResponse,
            api::models::auth::LoginRequest,
            api::models::auth::RefreshTokenRequest,
            api::models::auth::TokenPairResponse,
            api::models::auth::LogoutResponse,
            api::models::auth::IsAdminResponse,
            api::models::auth::ValidateSessionResponse,
            api::models::auth::ErrorResponse,
            auth::tokens::AccessClaims,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and session lifecycle"),
        (name = "health", description = "Liveness"),
    ),
    info(
        title = "authd",
        description = "Authentication and session service",
    )
)]
pub struct ApiDoc;
