//! Projection implementations (read model builders).
//!
//! Projections consume committed events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: reconstructed from the event store on startup
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: an envelope at or below the stream cursor is ignored

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use forgepos_core::{AggregateId, TenantId};
use forgepos_events::EventEnvelope;

use crate::event_store::StoredEvent;

pub mod categories;
pub mod parties;
pub mod products;
pub mod stock_adjustments;
pub mod transactions;

pub use categories::{CategoryProjection, CategoryReadModel};
pub use parties::{PartyProjection, PartyReadModel};
pub use products::{ProductCatalogProjection, ProductReadModel};
pub use stock_adjustments::{AdjustmentFilter, StockAdjustmentProjection};
pub use transactions::{TransactionFilter, TransactionHistoryProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize { aggregate_type: String, message: String },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event references unknown record {0}")]
    MissingRecord(String),
}

impl ProjectionError {
    pub(crate) fn deserialize(envelope: &EventEnvelope<JsonValue>, err: serde_json::Error) -> Self {
        ProjectionError::Deserialize {
            aggregate_type: envelope.aggregate_type().to_string(),
            message: err.to_string(),
        }
    }
}

/// A read model fed by committed events of one aggregate type.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Aggregate type whose events this projection consumes.
    fn aggregate_type(&self) -> &'static str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state and cursors ahead of a rebuild.
    fn reset(&self);
}

/// Last applied sequence number per `(tenant, aggregate)` stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    /// Decide whether `envelope` is the next event of its stream.
    ///
    /// `Ok(false)` for a replay of something already applied; an error for a
    /// gap, since applying it would skip state.
    pub fn should_apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let key = (envelope.tenant_id(), envelope.aggregate_id());
        let seq = envelope.sequence_number();
        let last = self
            .inner
            .read()
            .ok()
            .and_then(|m| m.get(&key).copied())
            .unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Ok(mut m) = self.inner.write() {
            m.insert(
                (envelope.tenant_id(), envelope.aggregate_id()),
                envelope.sequence_number(),
            );
        }
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}

/// Check that an event's own tenant matches the envelope it arrived in.
pub(crate) fn ensure_tenant(envelope: &EventEnvelope<JsonValue>, event_tenant: TenantId) -> Result<(), ProjectionError> {
    if event_tenant != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    Ok(())
}

/// Every read model the service queries, updated together after each commit.
#[derive(Debug, Default)]
pub struct ReadModels {
    pub products: ProductCatalogProjection,
    pub categories: CategoryProjection,
    pub parties: PartyProjection,
    pub transactions: TransactionHistoryProjection,
    pub adjustments: StockAdjustmentProjection,
}

impl ReadModels {
    pub fn new() -> Self {
        Self::default()
    }

    fn all(&self) -> [&dyn Projection; 5] {
        [
            &self.products,
            &self.categories,
            &self.parties,
            &self.transactions,
            &self.adjustments,
        ]
    }

    /// Route one committed envelope to every projection that consumes it.
    ///
    /// Every interested projection is attempted; the first error is returned.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let mut first_err = None;
        for projection in self.all() {
            if projection.aggregate_type() != envelope.aggregate_type() {
                continue;
            }
            if let Err(e) = projection.apply_envelope(envelope) {
                tracing::error!(
                    projection = projection.name(),
                    aggregate_id = %envelope.aggregate_id(),
                    sequence_number = envelope.sequence_number(),
                    error = %e,
                    "projection failed to apply event"
                );
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Reset every projection and replay `events` (commit order).
    pub fn rebuild<'a>(&self, events: impl IntoIterator<Item = &'a StoredEvent>) -> Result<usize, ProjectionError> {
        for projection in self.all() {
            projection.reset();
        }
        let mut applied = 0;
        for stored in events {
            self.apply(&stored.to_envelope())?;
            applied += 1;
        }
        Ok(applied)
    }
}
