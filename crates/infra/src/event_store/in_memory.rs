use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use forgepos_core::{AggregateId, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, validate_batch};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    /// Every committed event in commit order.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev and the default non-persistent deployment. A batch
/// is checked and written under a single write lock, so concurrent batches
/// serialize and a failed check leaves every stream untouched.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&batch)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        // Check every stream first; nothing is written unless all pass.
        for append in &batch {
            let Some((tenant_id, aggregate_id)) = append.stream_key() else {
                continue;
            };
            let key = StreamKey {
                tenant_id,
                aggregate_id,
            };
            let stream = inner.streams.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let current = Self::current_version(stream);

            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {aggregate_id}: expected {:?}, found {current}",
                    append.expected_version
                )));
            }

            if let (Some(existing), Some(incoming)) = (stream.first(), append.aggregate_type()) {
                if existing.aggregate_type != incoming {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, incoming
                    )));
                }
            }
        }

        let mut committed = Vec::new();
        for append in batch {
            let Some((tenant_id, aggregate_id)) = append.stream_key() else {
                continue;
            };
            let key = StreamKey {
                tenant_id,
                aggregate_id,
            };
            let Inner { streams, log } = &mut *inner;
            let stream = streams.entry(key).or_default();

            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    tenant_id: e.tenant_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                log.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    async fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner.streams.get(&key).cloned().unwrap_or_default())
    }

    async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        Ok(inner.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::UncommittedEvent;
    use chrono::Utc;
    use forgepos_core::ExpectedVersion;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "test.stream".to_string(),
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn assigns_sequence_numbers_from_one() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let committed = store
            .append(vec![event(tenant, agg), event(tenant, agg)], ExpectedVersion::Exact(0))
            .await
            .unwrap();
        assert_eq!(
            committed.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let err = store
            .append(vec![event(tenant, agg)], ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let agg = AggregateId::new();
        let owner = TenantId::new();

        store
            .append(vec![event(owner, agg)], ExpectedVersion::Exact(0))
            .await
            .unwrap();

        assert!(store.load_stream(TenantId::new(), agg).await.unwrap().is_empty());
        assert_eq!(store.load_stream(owner, agg).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_batch_writes_nothing() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(vec![event(tenant, b)], ExpectedVersion::Exact(0))
            .await
            .unwrap();

        // `a` would succeed on its own; `b` is stale, so the whole batch fails.
        let err = store
            .append_batch(vec![
                StreamAppend::new(vec![event(tenant, a)], ExpectedVersion::Exact(0)),
                StreamAppend::new(vec![event(tenant, b)], ExpectedVersion::Exact(0)),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));

        assert!(store.load_stream(tenant, a).await.unwrap().is_empty());
        assert_eq!(store.load_stream(tenant, b).await.unwrap().len(), 1);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_all_preserves_commit_order() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append_batch(vec![
                StreamAppend::new(vec![event(tenant, b)], ExpectedVersion::Exact(0)),
                StreamAppend::new(vec![event(tenant, a)], ExpectedVersion::Exact(0)),
            ])
            .await
            .unwrap();
        store
            .append(vec![event(tenant, b)], ExpectedVersion::Exact(1))
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        let order: Vec<_> = all.iter().map(|e| (e.aggregate_id, e.sequence_number)).collect();
        assert_eq!(order, vec![(b, 1), (a, 1), (b, 2)]);
    }
}
