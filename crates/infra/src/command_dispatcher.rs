//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (tenant-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events (one atomic batch, optimistic concurrency per stream)
//!   ↓
//! 5. Update read models, then publish to the bus
//! ```
//!
//! Steps 1-3 may run for several aggregates before a single commit: a
//! [`UnitOfWork`] collects the decided events of every touched stream and
//! [`CommandDispatcher::commit`] appends them together.
//!
//! Steps 4 and 5 run under one dispatcher-wide lock, so projections receive
//! each stream's events in sequence order even when commits race.
//!
//! Step 5 runs after the append is durable and cannot undo it. A projection
//! or bus failure there is logged and the commit still succeeds; read models
//! are rebuilt from the store on the next start.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use forgepos_auth::AuthzError;
use forgepos_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use forgepos_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
use crate::projections::ReadModels;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed input or a rule the caller can fix (wrong sign, cash short).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant would be broken (e.g. stock would go negative).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Business-level conflict (duplicate SKU, category in use, already inactive).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Optimistic concurrency failure (a stream moved since it was loaded).
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Stored payload could not be read back as the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl DispatchError {
    pub fn not_found(kind: &str, id: impl core::fmt::Display) -> Self {
        DispatchError::NotFound(format!("{kind} {id}"))
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::NotFound => DispatchError::NotFound("record".to_string()),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
        }
    }
}

impl From<AuthzError> for DispatchError {
    fn from(value: AuthzError) -> Self {
        DispatchError::Forbidden(value.to_string())
    }
}

/// An aggregate rebuilt from its stream, with the version to expect on append.
#[derive(Debug, Clone)]
pub struct Rehydrated<A> {
    pub aggregate: A,
    pub version: u64,
}

impl<A> Rehydrated<A> {
    pub fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version)
    }
}

/// Decided-but-uncommitted events for one or more streams of a tenant.
#[derive(Debug)]
pub struct UnitOfWork {
    tenant_id: TenantId,
    appends: Vec<StreamAppend>,
}

impl UnitOfWork {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            appends: Vec::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn is_empty(&self) -> bool {
        self.appends.is_empty()
    }

    /// Number of streams touched.
    pub fn stream_count(&self) -> usize {
        self.appends.len()
    }

    /// Stage `events` for one stream. An empty slice stages nothing.
    pub fn record<E>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        expected_version: ExpectedVersion,
        events: &[E],
    ) -> Result<(), DispatchError>
    where
        E: forgepos_events::Event + Serialize,
    {
        if events.is_empty() {
            return Ok(());
        }
        let uncommitted = events
            .iter()
            .map(|ev| UncommittedEvent::from_typed(self.tenant_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;
        self.appends
            .push(StreamAppend::new(uncommitted, expected_version));
        Ok(())
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run on the in-memory pair and the
/// server can swap in Postgres without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    read_models: Arc<ReadModels>,
    // Held from append through projection so read models see commits in store order.
    commit_lock: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B, read_models: Arc<ReadModels>) -> Self {
        Self {
            store,
            bus,
            read_models,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn read_models(&self) -> &Arc<ReadModels> {
        &self.read_models
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load and rehydrate one aggregate. A missing stream yields the fresh
    /// instance from `make_aggregate` at version 0.
    ///
    /// A stream that belongs to another aggregate type is `NotFound`: ids
    /// arrive from clients and may name the wrong kind of record.
    pub async fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Rehydrated<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id).await?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        if history.first().is_some_and(|e| e.aggregate_type != aggregate_type) {
            return Err(DispatchError::not_found(aggregate_type, aggregate_id));
        }

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        Ok(Rehydrated {
            aggregate,
            version: stream_version(&history),
        })
    }

    /// Load, decide and commit a single command against one aggregate.
    ///
    /// Returns the committed events; empty when the command was a no-op.
    #[instrument(
        skip_all,
        fields(tenant_id = %tenant_id, aggregate_id = %aggregate_id, aggregate_type = aggregate_type),
        err
    )]
    pub async fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: forgepos_events::Event + Serialize + DeserializeOwned,
    {
        let loaded = self.load(tenant_id, aggregate_id, aggregate_type, make_aggregate).await?;
        let decided = loaded.aggregate.handle(&command)?;

        let mut uow = UnitOfWork::new(tenant_id);
        uow.record(aggregate_id, aggregate_type, loaded.expected_version(), &decided)?;
        self.commit(uow).await
    }

    /// Atomically append everything staged in `uow`, then update read models
    /// and publish.
    #[instrument(skip_all, fields(tenant_id = %uow.tenant_id(), streams = uow.stream_count()), err)]
    pub async fn commit(&self, uow: UnitOfWork) -> Result<Vec<StoredEvent>, DispatchError> {
        if uow.is_empty() {
            return Ok(vec![]);
        }

        let _ordered = self.commit_lock.lock().await;
        let committed = self.store.append_batch(uow.appends).await?;

        for stored in &committed {
            let envelope = stored.to_envelope();
            if let Err(e) = self.read_models.apply(&envelope) {
                tracing::error!(event_id = %stored.event_id, error = %e, "read model update failed after commit");
            }
            if let Err(e) = self.bus.publish(envelope) {
                tracing::warn!(event_id = %stored.event_id, error = ?e, "event publication failed after commit");
            }
        }

        tracing::debug!(events = committed.len(), "committed");
        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // A misbehaving backend must never leak another tenant's events into a decision.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::Backend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = stored
            .decode()
            .map_err(|e| DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number)))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
