use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use forgepos_core::{AggregateId, ExpectedVersion, TenantId};
use forgepos_events::EventEnvelope;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serializes the payload and captures the metadata needed to read it back:
///
/// 1. **Domain event**: produced by an aggregate's `handle()`
/// 2. **UncommittedEvent**: wrapped with stream metadata
/// 3. **StoredEvent**: persisted with its sequence number
/// 4. **EventEnvelope**: handed to projections and the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: forgepos_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A persisted event.
///
/// Sequence numbers are stream-scoped, start at 1 and have no gaps; the
/// sequence number of the last event is the stream version used for
/// optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Deserialize the payload into a typed domain event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        E::deserialize(&self.payload)
    }

    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Events for one stream plus the version that stream must be at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub events: Vec<UncommittedEvent>,
    pub expected_version: ExpectedVersion,
}

impl StreamAppend {
    pub fn new(events: Vec<UncommittedEvent>, expected_version: ExpectedVersion) -> Self {
        Self {
            events,
            expected_version,
        }
    }

    /// `(tenant_id, aggregate_id)` of the stream. `None` for an empty append.
    pub fn stream_key(&self) -> Option<(TenantId, AggregateId)> {
        self.events.first().map(|e| (e.tenant_id, e.aggregate_id))
    }

    pub fn aggregate_type(&self) -> Option<&str> {
        self.events.first().map(|e| e.aggregate_type.as_str())
    }
}

/// Event store operation error.
///
/// Infrastructure failures only; domain failures are `DomainError`.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Append-only, tenant-scoped event store.
///
/// Streams are keyed by `(tenant_id, aggregate_id)`. An append names the
/// version each stream must be at; a mismatch is `Concurrency` and nothing is
/// written.
///
/// `append_batch` is the primitive: every stream in the batch is checked
/// before anything is written, and either all events are persisted or none
/// are. Checkout relies on this to commit stock decrements for several
/// products together with the sale record.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append to a single stream.
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_batch(vec![StreamAppend::new(events, expected_version)])
            .await
    }

    /// Atomically append to several streams. Returns the committed events in
    /// batch order.
    async fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load one stream in sequence order. Empty if the stream does not exist.
    async fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Every stored event across all tenants, in commit order. Used to
    /// rebuild read models on startup.
    async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_batch(batch).await
    }

    async fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id).await
    }

    async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all().await
    }
}

/// Structural checks shared by every backend, run before touching storage.
///
/// Each stream append must be non-empty and target exactly one
/// tenant/aggregate/type; a stream may appear at most once per batch.
pub(crate) fn validate_batch(batch: &[StreamAppend]) -> Result<(), EventStoreError> {
    let mut seen = HashSet::new();

    for (stream_idx, append) in batch.iter().enumerate() {
        let Some(first) = append.events.first() else {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream append {stream_idx} has no events"
            )));
        };

        for (idx, e) in append.events.iter().enumerate() {
            if e.tenant_id != first.tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "stream append {stream_idx} contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != first.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream append {stream_idx} contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream append {stream_idx} contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        if !seen.insert((first.tenant_id, first.aggregate_id)) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears more than once in one batch",
                first.aggregate_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: JsonValue::Null,
        }
    }

    #[test]
    fn rejects_mixed_tenants_in_one_stream() {
        let agg = AggregateId::new();
        let batch = vec![StreamAppend::new(
            vec![event(TenantId::new(), agg, "t"), event(TenantId::new(), agg, "t")],
            ExpectedVersion::Exact(0),
        )];
        assert!(matches!(
            validate_batch(&batch),
            Err(EventStoreError::TenantIsolation(_))
        ));
    }

    #[test]
    fn rejects_the_same_stream_twice() {
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        let batch = vec![
            StreamAppend::new(vec![event(tenant, agg, "t")], ExpectedVersion::Exact(0)),
            StreamAppend::new(vec![event(tenant, agg, "t")], ExpectedVersion::Exact(1)),
        ];
        assert!(matches!(
            validate_batch(&batch),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn rejects_empty_stream_append() {
        let batch = vec![StreamAppend::new(vec![], ExpectedVersion::Any)];
        assert!(validate_batch(&batch).is_err());
    }
}
