//! HTTP application wiring: router, auth layer, CORS and request tracing.
//!
//! - `routes/`: one file per resource
//! - `dto.rs`: response envelope and extractors
//! - `errors.rs`: `ApiError` and its envelope rendering

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use forgepos_auth::Hs256JwtValidator;
use forgepos_infra::config::CorsOrigins;
use forgepos_infra::{AppConfig, Backend, BackendError};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Assemble the backend described by `config` and the router over it.
pub async fn build_app(config: &AppConfig) -> Result<Router, BackendError> {
    let backend = Arc::new(Backend::from_config(config).await?);
    Ok(router(backend, config))
}

/// Router over an already assembled backend.
pub fn router(backend: Arc<Backend>, config: &AppConfig) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: bearer token + tenant context.
    let protected = routes::router()
        .layer(Extension(backend))
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .fallback(routes::system::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_origins)),
        )
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let allowed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(%origin, "ignoring unparseable CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(allowed))
        }
    }
}
