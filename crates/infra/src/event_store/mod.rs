//! Append-only event store boundary.
//!
//! Tenant-scoped event streams, appended in atomic multi-stream batches.
//! Backends: in-memory (tests/dev) and Postgres.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{
    AppendBatch, EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent, UniqueClaim,
};
