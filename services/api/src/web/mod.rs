pub mod dispatch;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use rest::{action_handler, status_handler, ApiDoc};
use state::AppState;

pub use dispatch::dispatch;

/// Browsers call the office from the school's pages; with no configured
/// origin any origin is accepted.
fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, ConfigError> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(origin.parse::<HeaderValue>().map_err(|e| {
            ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
        })?),
        None => AllowOrigin::any(),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]))
}

/// Builds the complete application: the action endpoint plus Swagger UI.
pub fn router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let cors = cors_layer(state.config.cors_origin.as_deref())?;

    let api_router = Router::new()
        .route("/", get(status_handler).post(action_handler))
        .layer(axum_middleware::from_fn(middleware::request_span))
        .layer(cors)
        .with_state(state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
