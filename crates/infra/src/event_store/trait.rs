use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockforge_core::{AggregateId, ExpectedVersion, TenantId};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Use `UncommittedEvent::from_typed()` to build one from a typed domain event:
/// the payload is serialized to JSON and the event metadata (type, version,
/// occurrence time) is captured alongside the stream coordinates.
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

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are stream-scoped, start at 1, and increase by one per
/// event with no gaps. The sequence number of the last event is the stream
/// version used for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
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
}

/// Events for one stream within an `AppendBatch`, guarded by an expected version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

/// A storage-level unique key claimed together with a batch.
///
/// Claims are global (not tenant-scoped): a `(scope, value)` pair can be
/// claimed exactly once across the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueClaim {
    pub scope: String,
    pub value: String,
}

impl UniqueClaim {
    pub fn new(scope: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            value: value.into(),
        }
    }
}

/// Unit of atomic persistence: appends to several streams plus unique claims.
///
/// Either every stream append and every claim is committed, or none is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendBatch {
    pub streams: Vec<StreamAppend>,
    pub claims: Vec<UniqueClaim>,
}

impl AppendBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stream(&mut self, stream: StreamAppend) {
        self.streams.push(stream);
    }

    pub fn claim(&mut self, claim: UniqueClaim) {
        self.claims.push(claim);
    }

    /// True when nothing would be written (no events and no claims).
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.streams.iter().all(|s| s.events.is_empty())
    }

    /// Shared structural checks every backend runs before touching storage.
    ///
    /// - all streams belong to one tenant
    /// - every event matches its stream's tenant, aggregate and type
    /// - a stream appears at most once
    pub fn validate(&self) -> Result<(), EventStoreError> {
        let tenant_id = match self.streams.first() {
            Some(s) => s.tenant_id,
            None => return Ok(()),
        };

        let mut seen = std::collections::HashSet::new();
        for stream in &self.streams {
            if stream.tenant_id != tenant_id {
                return Err(EventStoreError::TenantIsolation(
                    "batch spans multiple tenants".to_string(),
                ));
            }
            if !seen.insert(stream.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one batch",
                    stream.aggregate_id
                )));
            }
            for (idx, e) in stream.events.iter().enumerate() {
                if e.tenant_id != stream.tenant_id {
                    return Err(EventStoreError::TenantIsolation(format!(
                        "event tenant_id mismatch in stream {} (index {idx})",
                        stream.aggregate_id
                    )));
                }
                if e.aggregate_id != stream.aggregate_id {
                    return Err(EventStoreError::InvalidAppend(format!(
                        "event aggregate_id mismatch in stream {} (index {idx})",
                        stream.aggregate_id
                    )));
                }
                if e.aggregate_type != stream.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "event aggregate_type '{}' in stream of type '{}'",
                        e.aggregate_type, stream.aggregate_type
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Event store operation error.
///
/// These are infrastructure errors (storage, concurrency, isolation) as opposed
/// to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A stream moved past the expected version (lost an optimistic race).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A unique claim in the batch is already taken.
    #[error("unique claim already taken: {scope}={value}")]
    UniqueViolation { scope: String, value: String },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// The backend itself failed (connection, IO, runtime).
    #[error("event store backend failure: {0}")]
    Backend(String),
}

/// Append-only, tenant-scoped event store.
///
/// Streams are keyed by `(tenant_id, aggregate_id)`; within a stream events carry
/// sequence numbers 1, 2, 3, ... Implementations must:
/// - enforce tenant isolation on reads and writes
/// - check every stream's `ExpectedVersion` before writing anything
/// - commit a whole `AppendBatch` (events and claims) atomically
/// - return `load_by_type` results in commit order
pub trait EventStore: Send + Sync {
    /// Atomically append to every stream in the batch and take every claim.
    ///
    /// Returns the committed events in batch order.
    fn append_batch(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append events to a single aggregate stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let first = match events.first() {
            Some(e) => e,
            None => return Ok(vec![]),
        };

        let stream = StreamAppend {
            tenant_id: first.tenant_id,
            aggregate_id: first.aggregate_id,
            aggregate_type: first.aggregate_type.clone(),
            expected_version,
            events,
        };
        self.append_batch(AppendBatch {
            streams: vec![stream],
            claims: vec![],
        })
    }

    /// Load the full stream for a tenant + aggregate.
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event of one aggregate type for a tenant, in commit order.
    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append_batch(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_batch(batch)
    }

    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_by_type(tenant_id, aggregate_type)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: stockforge_events::Event + Serialize,
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
