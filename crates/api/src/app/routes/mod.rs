use axum::{Extension, Router, routing::get};

use forgepos_parties::PartyKind;

pub mod categories;
pub mod checkout;
pub mod inventory;
pub mod parties;
pub mod products;
pub mod reports;
pub mod system;
pub mod transactions;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/inventory", inventory::router())
        .nest("/checkout", checkout::router())
        .nest("/transactions", transactions::router())
        .nest("/suppliers", parties::router().layer(Extension(PartyKind::Supplier)))
        .nest("/customers", parties::router().layer(Extension(PartyKind::Customer)))
        .nest("/reports", reports::router())
}
