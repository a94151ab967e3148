//! Postgres-backed event store implementation.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `EventStoreError` | Scenario |
//! |------------|---------------|-------------------|----------|
//! | Database (unique violation) | `23505` | `Concurrency` | concurrent append won the race for a sequence number |
//! | Database (check violation) | `23514` | `InvalidAppend` | invalid data (e.g. `sequence_number <= 0`) |
//! | Database (other) | any other | `Backend` | other database errors |
//! | PoolClosed / Io / other | n/a | `Backend` | connection and network failures |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use forgepos_core::{AggregateId, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, validate_batch};

const SCHEMA: &str = include_str!("../../migrations/0001_events.sql");

/// Postgres-backed append-only event store.
///
/// Every query is scoped by `tenant_id`. A batch runs in one transaction:
/// each stream's version is read and checked, then all events are inserted
/// and the transaction commits. A concurrent writer that slips in between
/// the check and the insert trips the unique constraint on
/// `(tenant_id, aggregate_id, sequence_number)` and the whole batch rolls
/// back as a concurrency error.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `events` table and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn append_stream(
        tx: &mut Transaction<'_, Postgres>,
        append: StreamAppend,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some((tenant_id, aggregate_id)) = append.stream_key() else {
            return Ok(vec![]);
        };
        let aggregate_type = append.aggregate_type().unwrap_or_default().to_string();

        let (current_version, existing_type) = check_stream_version(tx, tenant_id, aggregate_id).await?;

        if let Some(existing) = existing_type {
            if existing != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{existing}', attempted append with '{aggregate_type}'"
                )));
            }
        }

        if !append.expected_version.matches(current_version) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {aggregate_id}: expected {:?}, found {current_version}",
                append.expected_version
            )));
        }

        let mut stored_events = Vec::with_capacity(append.events.len());
        let mut next_sequence = current_version + 1;

        for event in append.events {
            sqlx::query(
                r#"
                INSERT INTO events (
                    event_id,
                    tenant_id,
                    aggregate_id,
                    aggregate_type,
                    sequence_number,
                    event_type,
                    event_version,
                    occurred_at,
                    payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event.event_id)
            .bind(tenant_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .bind(&aggregate_type)
            .bind(next_sequence as i64)
            .bind(&event.event_type)
            .bind(event.event_version as i32)
            .bind(event.occurred_at)
            .bind(&event.payload)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EventStoreError::Concurrency(format!(
                        "concurrent append detected: stream {aggregate_id} sequence_number {next_sequence} already exists"
                    ))
                } else {
                    map_sqlx_error("insert_event", e)
                }
            })?;

            stored_events.push(StoredEvent {
                event_id: event.event_id,
                tenant_id: event.tenant_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: next_sequence,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            });
            next_sequence += 1;
        }

        Ok(stored_events)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(skip(self, batch), fields(streams = batch.len()), err)]
    async fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&batch)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::new();
        for append in batch {
            // Dropping `tx` on error rolls the whole batch back.
            committed.extend(Self::append_stream(&mut tx, append).await?);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::debug!(committed_events = committed.len(), "batch committed");
        Ok(committed)
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, aggregate_id = %aggregate_id),
        err
    )]
    async fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                tenant_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows_to_events(rows)
    }

    #[instrument(skip(self), err)]
    async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                tenant_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM events
            ORDER BY global_position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        rows_to_events(rows)
    }
}

/// Returns `(current_version, aggregate_type)`; `(0, None)` for a new stream.
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<String>), EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(MAX(sequence_number), 0) AS current_version,
            MAX(aggregate_type) AS aggregate_type
        FROM events
        WHERE tenant_id = $1 AND aggregate_id = $2
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current_version: i64 = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Backend(format!("failed to read current_version: {e}")))?;
    let aggregate_type: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| EventStoreError::Backend(format!("failed to read aggregate_type: {e}")))?;

    Ok((current_version as u64, aggregate_type))
}

fn rows_to_events(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<StoredEvent>, EventStoreError> {
    rows.iter()
        .map(|row| {
            StoredEventRow::from_row(row)
                .map(StoredEvent::from)
                .map_err(|e| EventStoreError::Backend(format!("failed to decode event row: {e}")))
        })
        .collect()
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => EventStoreError::Backend(format!("connection pool closed in {operation}")),
        other => EventStoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[derive(Debug)]
struct StoredEventRow {
    event_id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    aggregate_id: uuid::Uuid,
    aggregate_type: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEventRow {
            event_id: row.try_get("event_id")?,
            tenant_id: row.try_get("tenant_id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl From<StoredEventRow> for StoredEvent {
    fn from(row: StoredEventRow) -> Self {
        StoredEvent {
            event_id: row.event_id,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            sequence_number: row.sequence_number as u64,
            event_type: row.event_type,
            event_version: row.event_version as u32,
            occurred_at: row.occurred_at,
            payload: row.payload,
        }
    }
}
