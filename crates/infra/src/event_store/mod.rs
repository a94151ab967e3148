//! Append-only event store boundary.
//!
//! The trait makes no storage assumptions; `InMemoryEventStore` backs tests
//! and the default deployment, `PostgresEventStore` the persistent one.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
