use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use forgepos_auth::{JwtValidator, Principal};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Verify the bearer token and attach a [`RequestContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized("invalid or expired token".to_string())
    })?;

    req.extensions_mut()
        .insert(RequestContext::new(Principal::from_claims(&claims)));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::Unauthorized("missing bearer token".to_string());

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?;
    let header = header.to_str().map_err(|_| missing())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing());
    }

    Ok(token)
}
