use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use forgepos_core::{AggregateId, TenantId};
use forgepos_events::EventEnvelope;
use forgepos_inventory::{AdjustmentType, StockAdjustment};
use forgepos_products::{PRODUCT_AGGREGATE, ProductEvent};

use crate::projections::{Projection, ProjectionError, StreamCursors, ensure_tenant};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Adjustment log query. Bounds are half-open: `from <= occurred_at < to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdjustmentFilter {
    #[serde(default)]
    pub product_id: Option<AggregateId>,
    #[serde(default)]
    pub adjustment_type: Option<AdjustmentType>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AdjustmentFilter {
    pub fn matches(&self, adj: &StockAdjustment) -> bool {
        self.product_id.is_none_or(|p| adj.product_id == p)
            && self.adjustment_type.is_none_or(|t| adj.adjustment_type == t)
            && self.from.is_none_or(|from| adj.occurred_at >= from)
            && self.to.is_none_or(|to| adj.occurred_at < to)
    }
}

/// Append-only audit log of every stock change, across all products.
#[derive(Debug, Default)]
pub struct StockAdjustmentProjection {
    store: InMemoryTenantStore<Uuid, StockAdjustment>,
    cursors: StreamCursors,
}

impl StockAdjustmentProjection {
    /// Matching adjustments, newest first.
    pub fn list(&self, tenant_id: TenantId, filter: &AdjustmentFilter) -> Vec<StockAdjustment> {
        let mut entries: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        entries.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.adjustment_id.cmp(&a.adjustment_id))
        });
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }
        entries
    }
}

impl Projection for StockAdjustmentProjection {
    fn name(&self) -> &'static str {
        "inventory.adjustment_log"
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

        // Catalog events still advance the cursor so stock events stay contiguous.
        if let ProductEvent::StockAdjusted(e) = ev {
            ensure_tenant(envelope, e.tenant_id)?;
            self.store
                .upsert(envelope.tenant_id(), e.adjustment.adjustment_id, e.adjustment);
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
