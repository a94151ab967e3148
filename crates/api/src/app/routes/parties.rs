//! Shared by `/suppliers` and `/customers`; the nesting layer supplies the kind.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    routing::{get, post},
};

use forgepos_infra::Backend;
use forgepos_infra::parties::{PartyChanges, PartyInput, SuspendRequest};
use forgepos_parties::{PartyId, PartyKind};

use crate::app::dto::{ApiJson, ApiResult, created, ok, parse_id};
use crate::app::errors::ApiError;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_parties).post(register_party))
        .route("/:id", get(get_party).patch(update_party))
        .route("/:id/suspend", post(suspend_party))
        .route("/:id/reactivate", post(reactivate_party))
}

fn party_id(raw: &str, kind: PartyKind) -> Result<PartyId, ApiError> {
    parse_id(raw, kind.as_str()).map(PartyId::new)
}

pub async fn list_parties(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(kind): Extension<PartyKind>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult {
    ok("parties", backend.parties.list(ctx.principal(), kind)?)
}

pub async fn register_party(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(kind): Extension<PartyKind>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<PartyInput>,
) -> ApiResult {
    let party = backend.parties.register(ctx.principal(), kind, body).await?;
    created(&format!("{} registered", kind.as_str()), party)
}

pub async fn get_party(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(kind): Extension<PartyKind>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    ok(kind.as_str(), backend.parties.get(ctx.principal(), kind, party_id(&id, kind)?)?)
}

pub async fn update_party(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(kind): Extension<PartyKind>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PartyChanges>,
) -> ApiResult {
    let party = backend
        .parties
        .update(ctx.principal(), kind, party_id(&id, kind)?, body)
        .await?;
    ok(&format!("{} updated", kind.as_str()), party)
}

pub async fn suspend_party(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(kind): Extension<PartyKind>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SuspendRequest>,
) -> ApiResult {
    let party = backend
        .parties
        .suspend(ctx.principal(), kind, party_id(&id, kind)?, body)
        .await?;
    ok(&format!("{} suspended", kind.as_str()), party)
}

pub async fn reactivate_party(
    Extension(backend): Extension<Arc<Backend>>,
    Extension(kind): Extension<PartyKind>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let party = backend
        .parties
        .reactivate(ctx.principal(), kind, party_id(&id, kind)?)
        .await?;
    ok(&format!("{} reactivated", kind.as_str()), party)
}
