use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    routing::get,
};

use forgepos_infra::Backend;
use forgepos_infra::projections::AdjustmentFilter;
use forgepos_infra::stock::StockUpdate;

use crate::app::dto::{ApiJson, ApiQuery, ApiResult, created, ok};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/adjustments", get(list_adjustments).post(adjust_stock))
        .route("/alerts", get(list_alerts))
}

/// Manual stock movement (purchase, return, loss, correction).
pub async fn adjust_stock(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<StockUpdate>,
) -> ApiResult {
    let adjustment = backend.stock.update_stock(ctx.principal(), body).await?;
    created("stock adjusted", adjustment)
}

pub async fn list_adjustments(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(filter): ApiQuery<AdjustmentFilter>,
) -> ApiResult {
    ok("stock adjustments", backend.stock.list_adjustments(ctx.principal(), &filter)?)
}

pub async fn list_alerts(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult {
    ok("low-stock alerts", backend.stock.alerts(ctx.principal())?)
}
