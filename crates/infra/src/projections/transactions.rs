use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use forgepos_core::{AggregateId, TenantId, UserId};
use forgepos_events::EventEnvelope;
use forgepos_sales::{PaymentMethod, TRANSACTION_AGGREGATE, TransactionEvent, TransactionId, TransactionRecorded};

use crate::projections::{Projection, ProjectionError, StreamCursors, ensure_tenant};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// History query. Bounds are half-open: `from <= occurred_at < to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cashier_id: Option<UserId>,
    #[serde(default)]
    pub customer_id: Option<AggregateId>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &TransactionRecorded) -> bool {
        self.from.is_none_or(|from| tx.occurred_at >= from)
            && self.to.is_none_or(|to| tx.occurred_at < to)
            && self.cashier_id.is_none_or(|c| tx.cashier_id == c)
            && self.customer_id.is_none_or(|c| tx.customer_id == Some(c))
            && self.payment_method.is_none_or(|m| tx.payment_method == m)
    }
}

/// Sale history: every recorded transaction, immutable.
#[derive(Debug, Default)]
pub struct TransactionHistoryProjection {
    store: InMemoryTenantStore<TransactionId, TransactionRecorded>,
    cursors: StreamCursors,
}

impl TransactionHistoryProjection {
    pub fn get(&self, tenant_id: TenantId, transaction_id: &TransactionId) -> Option<TransactionRecorded> {
        self.store.get(tenant_id, transaction_id)
    }

    /// Matching transactions, newest first.
    pub fn list(&self, tenant_id: TenantId, filter: &TransactionFilter) -> Vec<TransactionRecorded> {
        let mut txs: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect();
        txs.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.transaction_id.0.cmp(&a.transaction_id.0))
        });
        if let Some(limit) = filter.limit {
            txs.truncate(limit);
        }
        txs
    }
}

impl Projection for TransactionHistoryProjection {
    fn name(&self) -> &'static str {
        "sales.transaction_history"
    }

    fn aggregate_type(&self) -> &'static str {
        TRANSACTION_AGGREGATE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: TransactionEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::deserialize(envelope, e))?;

        match ev {
            TransactionEvent::TransactionRecorded(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(envelope.tenant_id(), e.transaction_id, e);
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
