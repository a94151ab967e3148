use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use forgepos_core::{Money, TenantId};
use forgepos_events::EventEnvelope;
use forgepos_inventory::{StockLevel, StockStatus};
use forgepos_products::{CategoryId, PRODUCT_AGGREGATE, ProductEvent, ProductId};

use crate::projections::{Projection, ProjectionError, StreamCursors, ensure_tenant};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Queryable product read model (catalog + current stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub cost: Money,
    pub stock: i64,
    pub low_stock_threshold: i64,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    pub stock_status: StockStatus,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl ProductReadModel {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::new(self.stock, self.low_stock_threshold)
    }

    pub fn needs_reorder(&self) -> bool {
        self.stock_level().needs_reorder()
    }

    fn refresh_status(&mut self) {
        self.stock_status = self.stock_level().status();
    }
}

#[derive(Debug, Default)]
pub struct ProductCatalogProjection {
    store: InMemoryTenantStore<ProductId, ProductReadModel>,
    cursors: StreamCursors,
}

impl ProductCatalogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    /// All products of a tenant, ordered by name then SKU.
    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        let mut products = self.store.list(tenant_id);
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
        products
    }

    /// Case-insensitive SKU lookup.
    pub fn find_by_sku(&self, tenant_id: TenantId, sku: &str) -> Option<ProductReadModel> {
        let sku = sku.trim();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|p| p.sku.eq_ignore_ascii_case(sku))
    }

    pub fn count_in_category(&self, tenant_id: TenantId, category_id: CategoryId) -> usize {
        self.store
            .list(tenant_id)
            .iter()
            .filter(|p| p.category_id == Some(category_id))
            .count()
    }

    /// Active products flagged for reorder, largest shortfall first.
    pub fn low_stock(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        let mut flagged: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.is_active && p.needs_reorder())
            .collect();
        flagged.sort_by(|a, b| {
            b.stock_level()
                .shortfall()
                .cmp(&a.stock_level().shortfall())
                .then_with(|| a.name.cmp(&b.name))
        });
        flagged
    }

    fn existing(&self, envelope: &EventEnvelope<JsonValue>, product_id: ProductId) -> Result<ProductReadModel, ProjectionError> {
        self.store
            .get(envelope.tenant_id(), &product_id)
            .ok_or_else(|| ProjectionError::MissingRecord(format!("product {product_id}")))
    }
}

impl Projection for ProductCatalogProjection {
    fn name(&self) -> &'static str {
        "products.catalog"
    }

    fn aggregate_type(&self) -> &'static str {
        PRODUCT_AGGREGATE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: ProductEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::deserialize(envelope, e))?;
        let tenant_id = envelope.tenant_id();
        let seq = envelope.sequence_number();
        let at = envelope.occurred_at();

        match ev {
            ProductEvent::ProductCreated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut rm = ProductReadModel {
                    product_id: e.product_id,
                    sku: e.sku,
                    name: e.name,
                    price: e.price,
                    cost: e.cost,
                    stock: e.initial_stock,
                    low_stock_threshold: e.low_stock_threshold,
                    category_id: e.category_id,
                    is_active: true,
                    stock_status: StockStatus::InStock,
                    version: seq,
                    updated_at: at,
                };
                rm.refresh_status();
                self.store.upsert(tenant_id, e.product_id, rm);
            }
            ProductEvent::ProductUpdated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut rm = self.existing(envelope, e.product_id)?;
                rm.name = e.name;
                rm.price = e.price;
                rm.cost = e.cost;
                rm.low_stock_threshold = e.low_stock_threshold;
                rm.category_id = e.category_id;
                rm.refresh_status();
                rm.version = seq;
                rm.updated_at = at;
                self.store.upsert(tenant_id, e.product_id, rm);
            }
            ProductEvent::ProductDeactivated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut rm = self.existing(envelope, e.product_id)?;
                rm.is_active = false;
                rm.version = seq;
                rm.updated_at = at;
                self.store.upsert(tenant_id, e.product_id, rm);
            }
            ProductEvent::ProductReactivated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut rm = self.existing(envelope, e.product_id)?;
                rm.is_active = true;
                rm.version = seq;
                rm.updated_at = at;
                self.store.upsert(tenant_id, e.product_id, rm);
            }
            ProductEvent::StockAdjusted(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let product_id = ProductId::new(e.adjustment.product_id);
                let mut rm = self.existing(envelope, product_id)?;
                rm.stock = e.adjustment.new_stock;
                rm.refresh_status();
                rm.version = seq;
                rm.updated_at = at;
                self.store.upsert(tenant_id, product_id, rm);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
