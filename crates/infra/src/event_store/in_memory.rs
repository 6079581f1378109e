use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use stockforge_core::{AggregateId, TenantId};

use super::r#trait::{AppendBatch, EventStore, EventStoreError, StoredEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct State {
    /// Every committed event, in commit order.
    log: Vec<StoredEvent>,
    /// Stream -> indices into `log`.
    streams: HashMap<StreamKey, Vec<usize>>,
    claims: HashSet<(String, String)>,
}

impl State {
    fn current_version(&self, key: &StreamKey) -> u64 {
        self.streams
            .get(key)
            .and_then(|idx| idx.last())
            .map(|i| self.log[*i].sequence_number)
            .unwrap_or(0)
    }

    fn stream_type(&self, key: &StreamKey) -> Option<&str> {
        self.streams
            .get(key)
            .and_then(|idx| idx.first())
            .map(|i| self.log[*i].aggregate_type.as_str())
    }
}

/// In-memory append-only event store.
///
/// Intended for tests/dev and single-process deployments. One write lock covers
/// the whole batch, so every check and write in a batch is atomic.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    state: RwLock<State>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of committed events (all tenants).
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn append_batch(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        batch.validate()?;

        let mut state = self
            .state
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        // Check everything before writing anything.
        for stream in &batch.streams {
            let key = StreamKey {
                tenant_id: stream.tenant_id,
                aggregate_id: stream.aggregate_id,
            };
            let current = state.current_version(&key);
            if !stream.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    stream.aggregate_id, stream.expected_version
                )));
            }
            if let Some(existing) = state.stream_type(&key) {
                if existing != stream.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{existing}', attempted append with '{}'",
                        stream.aggregate_type
                    )));
                }
            }
        }

        let mut batch_claims = HashSet::new();
        for claim in &batch.claims {
            let k = (claim.scope.clone(), claim.value.clone());
            if state.claims.contains(&k) || !batch_claims.insert(k) {
                return Err(EventStoreError::UniqueViolation {
                    scope: claim.scope.clone(),
                    value: claim.value.clone(),
                });
            }
        }

        let mut committed = Vec::new();
        for stream in batch.streams {
            let key = StreamKey {
                tenant_id: stream.tenant_id,
                aggregate_id: stream.aggregate_id,
            };
            let mut next = state.current_version(&key) + 1;
            for e in stream.events {
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
                let position = state.log.len();
                state.log.push(stored.clone());
                state.streams.entry(key).or_default().push(position);
                committed.push(stored);
            }
        }
        state.claims.extend(batch_claims);

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let state = self
            .state
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(state
            .streams
            .get(&key)
            .map(|idx| idx.iter().map(|i| state.log[*i].clone()).collect())
            .unwrap_or_default())
    }

    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(state
            .log
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.aggregate_type == aggregate_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::{StreamAppend, UncommittedEvent, UniqueClaim};
    use chrono::Utc;
    use serde_json::json;
    use stockforge_core::ExpectedVersion;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({ "n": 1 }),
        }
    }

    fn stream(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        count: usize,
    ) -> StreamAppend {
        StreamAppend {
            tenant_id,
            aggregate_id,
            aggregate_type: "test.agg".to_string(),
            expected_version,
            events: (0..count).map(|_| event(tenant_id, aggregate_id, "test.agg")).collect(),
        }
    }

    #[test]
    fn append_assigns_contiguous_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let first = store
            .append(vec![event(tenant, agg, "test.agg"), event(tenant, agg, "test.agg")], ExpectedVersion::Exact(0))
            .unwrap();
        let second = store
            .append(vec![event(tenant, agg, "test.agg")], ExpectedVersion::Exact(2))
            .unwrap();

        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second[0].sequence_number, 3);
        assert_eq!(store.load_stream(tenant, agg).unwrap().len(), 3);
    }

    #[test]
    fn stale_version_in_any_stream_rejects_the_whole_batch() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();
        store.append_batch(AppendBatch {
            streams: vec![stream(tenant, b, ExpectedVersion::Exact(0), 1)],
            claims: vec![],
        })
        .unwrap();

        let err = store
            .append_batch(AppendBatch {
                streams: vec![
                    stream(tenant, a, ExpectedVersion::Exact(0), 1),
                    stream(tenant, b, ExpectedVersion::Exact(0), 1),
                ],
                claims: vec![],
            })
            .unwrap_err();

        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert!(store.load_stream(tenant, a).unwrap().is_empty());
        assert_eq!(store.load_stream(tenant, b).unwrap().len(), 1);
    }

    #[test]
    fn unique_claims_are_taken_once_and_roll_back_with_the_batch() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let claim = UniqueClaim::new("orders.order_number", "ORD1");

        store
            .append_batch(AppendBatch {
                streams: vec![stream(tenant, AggregateId::new(), ExpectedVersion::Exact(0), 1)],
                claims: vec![claim.clone()],
            })
            .unwrap();

        let loser = AggregateId::new();
        let err = store
            .append_batch(AppendBatch {
                streams: vec![stream(tenant, loser, ExpectedVersion::Exact(0), 1)],
                claims: vec![claim],
            })
            .unwrap_err();

        assert!(matches!(err, EventStoreError::UniqueViolation { .. }));
        assert!(store.load_stream(tenant, loser).unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn batches_cannot_span_tenants() {
        let store = InMemoryEventStore::new();
        let err = store
            .append_batch(AppendBatch {
                streams: vec![
                    stream(TenantId::new(), AggregateId::new(), ExpectedVersion::Exact(0), 1),
                    stream(TenantId::new(), AggregateId::new(), ExpectedVersion::Exact(0), 1),
                ],
                claims: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn load_by_type_is_tenant_scoped_and_in_commit_order() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let other = TenantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store.append(vec![event(tenant, a, "test.agg")], ExpectedVersion::Exact(0)).unwrap();
        store.append(vec![event(other, a, "test.agg")], ExpectedVersion::Exact(0)).unwrap();
        store.append(vec![event(tenant, b, "test.agg")], ExpectedVersion::Exact(0)).unwrap();
        store.append(vec![event(tenant, a, "test.agg")], ExpectedVersion::Exact(1)).unwrap();
        store.append(vec![event(tenant, AggregateId::new(), "other.agg")], ExpectedVersion::Exact(0)).unwrap();

        let loaded = store.load_by_type(tenant, "test.agg").unwrap();
        let order: Vec<(AggregateId, u64)> = loaded.iter().map(|e| (e.aggregate_id, e.sequence_number)).collect();
        assert_eq!(order, vec![(a, 1), (b, 1), (a, 2)]);
    }
}
