//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! transact(tenant, work)
//!   ↓
//! 1. open a UnitOfWork
//!   ↓
//! 2. work: for each aggregate → load stream → rehydrate → handle → stage events
//!   ↓
//! 3. append the whole batch (every stream guarded by its loaded version)
//!   ↓
//! 4. on a concurrency conflict, throw the unit away and run `work` again
//! ```
//!
//! The work closure must be a pure function of what it loads: it is re-run from
//! scratch on every attempt, so it must not perform side effects. Anything that
//! should happen once (alerts, logs of committed facts) belongs after `transact`
//! returns.
//!
//! This module contains no IO itself; it composes the `EventStore` trait.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use stockforge_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};

use crate::event_store::{
    AppendBatch, EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent, UniqueClaim,
};

/// Default bound on optimistic commit attempts.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Service-level error for everything executed through the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// Domain conflict (finalized order, duplicate SKU) or exhausted retries.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A single attempt lost an optimistic race. Retried inside `transact`.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// A unique claim collided with an existing one.
    #[error("duplicate key {scope}={value}")]
    Duplicate { scope: String, value: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Stored payload could not be decoded into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::UniqueViolation { scope, value } => DispatchError::Duplicate { scope, value },
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidArgument(msg) => DispatchError::InvalidArgument(msg),
            DomainError::InvalidId(msg) => DispatchError::InvalidArgument(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::NotFound(what) => DispatchError::NotFound(what),
            DomainError::InsufficientStock {
                product,
                requested,
                available,
            } => DispatchError::InsufficientStock {
                product,
                requested,
                available,
            },
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
        }
    }
}

/// Result of staging one command: aggregate state before and after, plus the
/// decided events.
#[derive(Debug, Clone)]
pub struct Staged<A: Aggregate> {
    pub before: A,
    pub after: A,
    pub events: Vec<A::Event>,
}

/// One attempt's worth of staged writes, committed as a single `AppendBatch`.
pub struct UnitOfWork<'a, S: ?Sized> {
    store: &'a S,
    tenant_id: TenantId,
    batch: AppendBatch,
}

impl<'a, S> UnitOfWork<'a, S>
where
    S: EventStore + ?Sized,
{
    fn new(store: &'a S, tenant_id: TenantId) -> Self {
        Self {
            store,
            tenant_id,
            batch: AppendBatch::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Rehydrate an aggregate without staging anything.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        load_aggregate(self.store, self.tenant_id, aggregate_id, make_aggregate)
    }

    /// Load → rehydrate → handle, and stage the decided events.
    ///
    /// The stream is guarded by the version it was loaded at. A command that
    /// decides no events stages nothing.
    pub fn execute<A>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Staged<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Clone,
        A::Event: stockforge_events::Event + Serialize + DeserializeOwned,
    {
        let before: A = self.load(aggregate_id, make_aggregate)?;
        let decided = before.handle(command)?;

        let mut after = before.clone();
        for ev in &decided {
            after.apply(ev);
        }

        if !decided.is_empty() {
            let events = decided
                .iter()
                .map(|ev| {
                    UncommittedEvent::from_typed(
                        self.tenant_id,
                        aggregate_id,
                        aggregate_type,
                        Uuid::now_v7(),
                        ev,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;

            self.batch.push_stream(StreamAppend {
                tenant_id: self.tenant_id,
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                expected_version: ExpectedVersion::Exact(before.version()),
                events,
            });
        }

        Ok(Staged {
            before,
            after,
            events: decided,
        })
    }

    /// Claim a storage-level unique key as part of this unit.
    pub fn claim(&mut self, claim: UniqueClaim) {
        self.batch.claim(claim);
    }

    fn into_batch(self) -> AppendBatch {
        self.batch
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Guarantees:
/// - a unit of work is committed whole or not at all
/// - every stream write is checked against the version the decision was based on
/// - lost races are retried up to `max_commit_attempts`, then reported as `Conflict`
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
    max_commit_attempts: u32,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    pub fn max_commit_attempts(&self) -> u32 {
        self.max_commit_attempts
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Run `work` inside a unit of work and commit it atomically, retrying on
    /// optimistic conflicts.
    ///
    /// Returns the closure's output from the attempt that committed, together
    /// with the committed events.
    pub fn transact<T>(
        &self,
        tenant_id: TenantId,
        mut work: impl FnMut(&mut UnitOfWork<'_, S>) -> Result<T, DispatchError>,
    ) -> Result<(T, Vec<StoredEvent>), DispatchError> {
        let mut last_conflict = String::new();

        for attempt in 1..=self.max_commit_attempts {
            let mut uow = UnitOfWork::new(&self.store, tenant_id);
            let output = work(&mut uow)?;

            match self.store.append_batch(uow.into_batch()) {
                Ok(committed) => return Ok((output, committed)),
                Err(EventStoreError::Concurrency(msg)) => {
                    debug!(tenant_id = %tenant_id, attempt, conflict = %msg, "optimistic commit lost, retrying");
                    last_conflict = msg;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(DispatchError::Conflict(format!(
            "gave up after {} attempts: {last_conflict}",
            self.max_commit_attempts
        )))
    }

    /// Execute one command against one aggregate (single-stream unit of work).
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
    ) -> Result<(A, Vec<StoredEvent>), DispatchError>
    where
        A: Aggregate<Error = DomainError> + Clone,
        A::Event: stockforge_events::Event + Serialize + DeserializeOwned,
    {
        let (staged, committed) = self.transact(tenant_id, |uow| {
            uow.execute(aggregate_id, aggregate_type, &command, &make_aggregate)
        })?;
        Ok((staged.after, committed))
    }

    /// Rehydrate one aggregate (read path).
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        load_aggregate(&self.store, tenant_id, aggregate_id, make_aggregate)
    }

    /// Rehydrate every aggregate of a type for a tenant.
    ///
    /// Aggregates are returned in the order their streams were first written.
    pub fn load_all<A>(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
    ) -> Result<Vec<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let events = self.store.load_by_type(tenant_id, aggregate_type)?;

        let mut first_seen: Vec<AggregateId> = Vec::new();
        let mut streams: BTreeMap<AggregateId, Vec<StoredEvent>> = BTreeMap::new();
        for e in events {
            if e.tenant_id != tenant_id {
                return Err(DispatchError::TenantIsolation(format!(
                    "loaded event {} belongs to another tenant",
                    e.event_id
                )));
            }
            let stream = streams.entry(e.aggregate_id).or_default();
            if stream.is_empty() {
                first_seen.push(e.aggregate_id);
            }
            stream.push(e);
        }

        first_seen
            .into_iter()
            .map(|id| {
                let history = streams.remove(&id).unwrap_or_default();
                validate_loaded_stream(tenant_id, id, &history)?;
                let mut aggregate = make_aggregate(tenant_id, id);
                apply_history(&mut aggregate, &history)?;
                Ok(aggregate)
            })
            .collect()
    }
}

fn load_aggregate<S, A>(
    store: &S,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
) -> Result<A, DispatchError>
where
    S: EventStore + ?Sized,
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let history = store.load_stream(tenant_id, aggregate_id)?;
    validate_loaded_stream(tenant_id, aggregate_id, &history)?;

    let mut aggregate = make_aggregate(tenant_id, aggregate_id);
    apply_history(&mut aggregate, &history)?;

    if aggregate.version() != history.len() as u64 {
        return Err(DispatchError::InvariantViolation(format!(
            "aggregate {aggregate_id} version {} does not match stream length {}",
            aggregate.version(),
            history.len()
        )));
    }
    Ok(aggregate)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce tenant isolation even if a buggy backend returns cross-tenant data,
    // and require the contiguous 1..=n sequence the version check relies on.
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
        if e.sequence_number != idx as u64 + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (index {idx}, found {})",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;
    use stockforge_catalog::ProductId;
    use stockforge_core::UserId;
    use stockforge_inventory::{
        AdjustStock, InventoryCommand, InventoryRecord, MovementKind, AGGREGATE_TYPE,
    };

    use crate::event_store::InMemoryEventStore;

    fn adjust(tenant_id: TenantId, product_id: ProductId, delta: i64) -> InventoryCommand {
        InventoryCommand::AdjustStock(AdjustStock {
            tenant_id,
            product_id,
            delta,
            kind: if delta > 0 { MovementKind::Inbound } else { MovementKind::Outbound },
            operator: UserId::new(),
            batch: None,
            note: None,
            occurred_at: Utc::now(),
        })
    }

    fn make_record(_: TenantId, id: AggregateId) -> InventoryRecord {
        InventoryRecord::empty(ProductId::new(id))
    }

    /// Store that reports a concurrency conflict for the first `failures` batches.
    struct FlakyStore {
        inner: InMemoryEventStore,
        failures: AtomicU32,
    }

    impl EventStore for FlakyStore {
        fn append_batch(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(EventStoreError::Concurrency("simulated".to_string()));
            }
            self.inner.append_batch(batch)
        }

        fn load_stream(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(tenant_id, aggregate_id)
        }

        fn load_by_type(&self, tenant_id: TenantId, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_by_type(tenant_id, aggregate_type)
        }
    }

    #[test]
    fn dispatch_persists_and_rehydrates() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let tenant = TenantId::new();
        let id = AggregateId::new();
        let product = ProductId::new(id);

        let (after, committed) = dispatcher
            .dispatch(tenant, id, AGGREGATE_TYPE, adjust(tenant, product, 5), make_record)
            .unwrap();
        assert_eq!(after.quantity(), 5);
        assert_eq!(committed.len(), 2);

        let loaded: InventoryRecord = dispatcher.load(tenant, id, make_record).unwrap();
        assert_eq!(loaded, after);

        // Other tenants see an untouched record.
        let foreign: InventoryRecord = dispatcher.load(TenantId::new(), id, make_record).unwrap();
        assert_eq!(foreign.quantity(), 0);
        assert!(!foreign.is_opened());
    }

    #[test]
    fn domain_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let tenant = TenantId::new();
        let id = AggregateId::new();

        let err = dispatcher
            .transact(tenant, |uow| {
                calls.fetch_add(1, Ordering::SeqCst);
                uow.execute(id, AGGREGATE_TYPE, &adjust(tenant, ProductId::new(id), -1), make_record)
            })
            .unwrap_err();

        assert!(matches!(err, DispatchError::InsufficientStock { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lost_races_are_retried_then_reported_as_conflict() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryEventStore::new(),
            failures: AtomicU32::new(2),
        });
        let dispatcher = CommandDispatcher::new(store.clone()).with_max_commit_attempts(3);
        let tenant = TenantId::new();
        let id = AggregateId::new();

        let (after, _) = dispatcher
            .dispatch(tenant, id, AGGREGATE_TYPE, adjust(tenant, ProductId::new(id), 1), make_record)
            .unwrap();
        assert_eq!(after.quantity(), 1);

        store.failures.store(3, Ordering::SeqCst);
        let err = dispatcher
            .dispatch(tenant, id, AGGREGATE_TYPE, adjust(tenant, ProductId::new(id), 1), make_record)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));

        let loaded: InventoryRecord = dispatcher.load(tenant, id, make_record).unwrap();
        assert_eq!(loaded.quantity(), 1);
    }

    #[test]
    fn load_all_returns_aggregates_in_first_write_order() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let tenant = TenantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        for (id, delta) in [(b, 2), (a, 3), (b, 4)] {
            dispatcher
                .dispatch(tenant, id, AGGREGATE_TYPE, adjust(tenant, ProductId::new(id), delta), make_record)
                .unwrap();
        }

        let all: Vec<InventoryRecord> = dispatcher.load_all(tenant, AGGREGATE_TYPE, make_record).unwrap();
        let got: Vec<(AggregateId, i64)> = all.iter().map(|r| (r.product_id().0, r.quantity())).collect();
        assert_eq!(got, vec![(b, 6), (a, 3)]);
    }
}
