use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{get, patch},
};
use serde::Serialize;

use forgepos_infra::Backend;
use forgepos_infra::catalog::CategoryInput;
use forgepos_products::CategoryId;

use crate::app::dto::{ApiJson, ApiResult, created, ok, parse_id};
use crate::app::errors::ApiError;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", patch(rename_category).delete(delete_category))
}

fn category_id(raw: &str) -> Result<CategoryId, ApiError> {
    parse_id(raw, "category").map(CategoryId::new)
}

pub async fn list_categories(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult {
    ok("categories", backend.catalog.list_categories(ctx.principal())?)
}

pub async fn create_category(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<CategoryInput>,
) -> ApiResult {
    let category = backend.catalog.create_category(ctx.principal(), body).await?;
    created("category created", category)
}

pub async fn rename_category(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CategoryInput>,
) -> ApiResult {
    let category = backend
        .catalog
        .rename_category(ctx.principal(), category_id(&id)?, body)
        .await?;
    ok("category updated", category)
}

#[derive(Serialize)]
struct Deleted {
    id: String,
}

pub async fn delete_category(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let category_id = category_id(&id)?;
    backend.catalog.delete_category(ctx.principal(), category_id).await?;
    ok("category deleted", Deleted { id })
}
