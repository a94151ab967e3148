use axum::extract::Extension;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::app::dto::{ApiResult, ok};
use crate::app::errors::ApiError;
use crate::context::RequestContext;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub async fn health() -> ApiResult {
    ok("healthy", Health { status: "ok" })
}

#[derive(Serialize)]
struct WhoAmI {
    user_id: String,
    display_name: String,
    tenant_id: String,
    roles: Vec<String>,
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> ApiResult {
    let principal = ctx.principal();
    ok(
        "authenticated",
        WhoAmI {
            user_id: ctx.user_id().to_string(),
            display_name: principal.display_name.clone(),
            tenant_id: ctx.tenant_id().to_string(),
            roles: principal.roles().iter().map(|r| r.as_str().to_string()).collect(),
        },
    )
}

pub async fn not_found() -> Response {
    ApiError::NotFound("no such route".to_string()).into_response()
}
