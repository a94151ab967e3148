use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::get,
};

use forgepos_infra::Backend;
use forgepos_infra::projections::TransactionFilter;
use forgepos_sales::TransactionId;

use crate::app::dto::{ApiQuery, ApiResult, ok, parse_id};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transactions))
        .route("/:id", get(get_transaction))
}

pub async fn list_transactions(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(filter): ApiQuery<TransactionFilter>,
) -> ApiResult {
    ok("transactions", backend.reports.transactions(ctx.principal(), &filter)?)
}

pub async fn get_transaction(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let transaction_id = TransactionId::new(parse_id(&id, "transaction")?);
    ok("transaction", backend.reports.get_transaction(ctx.principal(), transaction_id)?)
}
