use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    routing::post,
};

use forgepos_infra::Backend;
use forgepos_infra::checkout::CheckoutRequest;

use crate::app::dto::{ApiJson, ApiResult, created, ok};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(complete_transaction))
        .route("/quote", post(quote))
}

/// Price a cart without recording anything.
pub async fn quote(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> ApiResult {
    ok("quote", backend.checkout.quote(ctx.principal(), body).await?)
}

pub async fn complete_transaction(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> ApiResult {
    let transaction = backend.checkout.complete_transaction(ctx.principal(), body).await?;
    created("transaction completed", transaction)
}
