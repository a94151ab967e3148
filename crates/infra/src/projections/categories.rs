use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use forgepos_core::TenantId;
use forgepos_events::EventEnvelope;
use forgepos_products::{CATEGORY_AGGREGATE, CategoryEvent, CategoryId};

use crate::projections::{Projection, ProjectionError, StreamCursors, ensure_tenant};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Live categories only; a deleted category drops out of the read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReadModel {
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CategoryProjection {
    store: InMemoryTenantStore<CategoryId, CategoryReadModel>,
    cursors: StreamCursors,
}

impl CategoryProjection {
    pub fn get(&self, tenant_id: TenantId, category_id: &CategoryId) -> Option<CategoryReadModel> {
        self.store.get(tenant_id, category_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<CategoryReadModel> {
        let mut categories = self.store.list(tenant_id);
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories
    }
}

impl Projection for CategoryProjection {
    fn name(&self) -> &'static str {
        "products.categories"
    }

    fn aggregate_type(&self) -> &'static str {
        CATEGORY_AGGREGATE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: CategoryEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::deserialize(envelope, e))?;
        let tenant_id = envelope.tenant_id();

        match ev {
            CategoryEvent::CategoryCreated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.category_id,
                    CategoryReadModel {
                        category_id: e.category_id,
                        name: e.name,
                        description: e.description,
                        updated_at: e.occurred_at,
                    },
                );
            }
            CategoryEvent::CategoryRenamed(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.category_id,
                    CategoryReadModel {
                        category_id: e.category_id,
                        name: e.name,
                        description: e.description,
                        updated_at: e.occurred_at,
                    },
                );
            }
            CategoryEvent::CategoryDeleted(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.remove(tenant_id, &e.category_id);
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
