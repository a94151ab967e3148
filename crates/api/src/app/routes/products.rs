use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{get, post},
};

use forgepos_infra::Backend;
use forgepos_infra::catalog::{NewProduct, ProductChanges};
use forgepos_products::ProductId;

use crate::app::dto::{ApiJson, ApiResult, created, ok, parse_id};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).patch(update_product))
        .route("/:id/deactivate", post(deactivate_product))
        .route("/:id/reactivate", post(reactivate_product))
}

fn product_id(raw: &str) -> Result<ProductId, crate::app::errors::ApiError> {
    parse_id(raw, "product").map(ProductId::new)
}

pub async fn create_product(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<NewProduct>,
) -> ApiResult {
    let product = backend.catalog.create_product(ctx.principal(), body).await?;
    created("product created", product)
}

pub async fn list_products(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult {
    ok("products", backend.catalog.list_products(ctx.principal())?)
}

pub async fn get_product(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    ok("product", backend.catalog.get_product(ctx.principal(), product_id(&id)?)?)
}

pub async fn update_product(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProductChanges>,
) -> ApiResult {
    let product = backend
        .catalog
        .update_product(ctx.principal(), product_id(&id)?, body)
        .await?;
    ok("product updated", product)
}

pub async fn deactivate_product(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let product = backend
        .catalog
        .deactivate_product(ctx.principal(), product_id(&id)?)
        .await?;
    ok("product deactivated", product)
}

pub async fn reactivate_product(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let product = backend
        .catalog
        .reactivate_product(ctx.principal(), product_id(&id)?)
        .await?;
    ok("product reactivated", product)
}
