use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    routing::get,
};

use forgepos_infra::Backend;
use forgepos_infra::reports::ReportQuery;

use crate::app::dto::{ApiQuery, ApiResult, ok};
use crate::context::RequestContext;

/// Every report takes optional `from`/`to` (RFC 3339); the window defaults
/// to the last 30 days.
pub fn router() -> Router {
    Router::new()
        .route("/sales-summary", get(sales_summary))
        .route("/top-products", get(top_products))
        .route("/daily-sales", get(daily_sales))
        .route("/stock-movements", get(stock_movements))
        .route("/low-stock", get(low_stock))
}

pub async fn sales_summary(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult {
    ok("sales summary", backend.reports.sales_summary(ctx.principal(), &query)?)
}

pub async fn top_products(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult {
    ok("top products", backend.reports.top_products(ctx.principal(), &query)?)
}

pub async fn daily_sales(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult {
    ok("daily sales", backend.reports.daily_sales(ctx.principal(), &query)?)
}

pub async fn stock_movements(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult {
    ok("stock movements", backend.reports.stock_movements(ctx.principal(), &query)?)
}

pub async fn low_stock(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult {
    ok("low stock", backend.reports.low_stock(ctx.principal())?)
}
