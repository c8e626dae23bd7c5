//! itemdesk API - REST server
//!
//! Username/password accounts with JWT access and refresh tokens, and
//! owner-scoped items.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    http::HeaderValue,
    middleware::from_fn,
    routing::get,
    Json, Router,
};
use itemdesk_core::config::ServerConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

/// OpenAPI document served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(title = "itemdesk API", description = "JWT-authenticated item service"),
    paths(
        handlers::health::root,
        handlers::health::health_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::items::create_item,
        handlers::items::list_items,
        handlers::items::get_item,
        handlers::items::delete_item,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::UserResponse,
        auth::TokenPairResponse,
        auth::AccessTokenResponse,
        auth::MessageResponse,
        handlers::items::CreateItemRequest,
        handlers::items::ItemResponse,
        handlers::health::HealthResponse,
        error::ApiError,
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "auth", description = "Registration and token management"),
        (name = "items", description = "Owner-scoped items"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// CORS policy; no configured origins means any origin
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", routes::api_routes(state.clone()))
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router over a fresh in-memory store with cheap password hashing
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(test_state()))
}

/// In-memory state with cheap password hashing
#[cfg(feature = "test-utils")]
pub fn test_state() -> AppState {
    let mut config = itemdesk_core::AppConfig::default();
    config.auth.password_memory_cost = 1024;
    config.auth.password_time_cost = 1;
    config.auth.password_parallelism = 1;

    match AppState::in_memory(config) {
        Ok(state) => state,
        Err(e) => panic!("test state must build from default config: {e}"),
    }
}
