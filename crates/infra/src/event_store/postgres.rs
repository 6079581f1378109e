//! Postgres-backed event store implementation.
//!
//! Schema lives in `crates/infra/migrations/`. One SQL transaction per
//! `AppendBatch`; the unique index on `(tenant_id, aggregate_id, sequence_number)`
//! detects concurrent appends and the `unique_claims` primary key enforces
//! storage-level unique keys (order numbers).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | EventStoreError | Scenario |
//! |------------|-----------------|-----------------|----------|
//! | Database (unique violation on `unique_claims`) | `23505` | `UniqueViolation` | Claim already taken |
//! | Database (unique violation, other) | `23505` | `Concurrency` | Concurrent append to the same stream |
//! | Database (check constraint violation) | `23514` | `InvalidAppend` | Invalid data (e.g. sequence_number <= 0) |
//! | Database (other) / PoolClosed / Io / ... | any | `Backend` | Storage failure |

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;

use stockforge_core::{AggregateId, TenantId};

use super::r#trait::{AppendBatch, EventStore, EventStoreError, StoredEvent, StreamAppend, UniqueClaim};

const CLAIMS_CONSTRAINT: &str = "unique_claims_pkey";

/// Postgres-backed append-only event store.
///
/// Every query includes `tenant_id` in its WHERE clause, so a caller cannot read
/// another tenant's stream by guessing an aggregate id.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and run the bundled migrations.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| EventStoreError::Backend(format!("migration failed: {e}")))?;
        Ok(Self::new(pool))
    }

    /// The pool this store runs on, for services that keep their own tables
    /// in the same database.
    pub fn pool(&self) -> PgPool {
        (*self.pool).clone()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, aggregate_id = %aggregate_id), err)]
    pub async fn load_stream_async(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, tenant_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows_to_events(rows)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn load_by_type_async(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, tenant_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE tenant_id = $1 AND aggregate_type = $2
            ORDER BY global_position ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_type)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_by_type", e))?;

        rows_to_events(rows)
    }

    /// Append a whole batch in one transaction.
    ///
    /// Streams are checked and written in aggregate-id order so two batches that
    /// touch the same streams take row locks in the same order.
    #[instrument(skip(self, batch), fields(streams = batch.streams.len(), claims = batch.claims.len()), err)]
    pub async fn append_batch_async(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        batch.validate()?;

        let tenant_id = batch.streams.first().map(|s| s.tenant_id);
        let stream_count = batch.streams.len();
        let mut streams: Vec<(usize, StreamAppend)> = batch.streams.into_iter().enumerate().collect();
        streams.sort_by_key(|(_, s)| s.aggregate_id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed: Vec<Option<Vec<StoredEvent>>> = vec![None; stream_count];
        for (idx, stream) in streams {
            let (current_version, existing_type) =
                check_stream_version(&mut tx, stream.tenant_id, stream.aggregate_id).await?;

            if let Some(existing) = existing_type {
                if existing != stream.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{existing}', attempted append with '{}'",
                        stream.aggregate_type
                    )));
                }
            }
            if !stream.expected_version.matches(current_version) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current_version}",
                    stream.aggregate_id, stream.expected_version
                )));
            }

            let mut next_sequence = current_version + 1;
            let mut stored_events = Vec::with_capacity(stream.events.len());
            for event in stream.events {
                sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id, tenant_id, aggregate_id, aggregate_type, sequence_number,
                        event_type, event_version, occurred_at, payload
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(event.event_id)
                .bind(stream.tenant_id.as_uuid())
                .bind(stream.aggregate_id.as_uuid())
                .bind(&stream.aggregate_type)
                .bind(next_sequence as i64)
                .bind(&event.event_type)
                .bind(event.event_version as i32)
                .bind(event.occurred_at)
                .bind(&event.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_event", e))?;

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
            committed[idx] = Some(stored_events);
        }

        for claim in &batch.claims {
            insert_claim(&mut tx, claim, tenant_id).await?;
        }

        // Dropping `tx` on any early return above rolls the whole batch back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed.into_iter().flatten().flatten().collect())
    }
}

/// Current stream version and type; `(0, None)` for a stream that does not exist.
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

    let current_version: Option<i64> = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Backend(format!("failed to read current_version: {e}")))?;
    let aggregate_type: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| EventStoreError::Backend(format!("failed to read aggregate_type: {e}")))?;

    Ok((current_version.unwrap_or(0) as u64, aggregate_type))
}

async fn insert_claim(
    tx: &mut Transaction<'_, Postgres>,
    claim: &UniqueClaim,
    tenant_id: Option<TenantId>,
) -> Result<(), EventStoreError> {
    sqlx::query("INSERT INTO unique_claims (scope, value, tenant_id) VALUES ($1, $2, $3)")
        .bind(&claim.scope)
        .bind(&claim.value)
        .bind(tenant_id.map(|t| *t.as_uuid()))
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_claim_violation(&e) {
                EventStoreError::UniqueViolation {
                    scope: claim.scope.clone(),
                    value: claim.value.clone(),
                }
            } else {
                map_sqlx_error("insert_claim", e)
            }
        })?;
    Ok(())
}

fn rows_to_events(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<StoredEvent>, EventStoreError> {
    rows.iter()
        .map(|row| {
            StoredEventRow::from_row(row)
                .map(StoredEvent::from)
                .map_err(|e| EventStoreError::Backend(format!("failed to deserialize event row: {e}")))
        })
        .collect()
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
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

fn is_claim_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(CLAIMS_CONSTRAINT);
    }
    false
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

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
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

/// The `EventStore` trait is synchronous; the services run on blocking threads
/// (`tokio::task::spawn_blocking`), where re-entering the runtime via
/// `Handle::block_on` is allowed.
pub(crate) fn runtime() -> Result<tokio::runtime::Handle, EventStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        EventStoreError::Backend(
            "Postgres storage requires a tokio runtime; call it from spawn_blocking".to_string(),
        )
    })
}

impl EventStore for PostgresEventStore {
    fn append_batch(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError> {
        runtime()?.block_on(self.append_batch_async(batch))
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        runtime()?.block_on(self.load_stream_async(tenant_id, aggregate_id))
    }

    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        runtime()?.block_on(self.load_by_type_async(tenant_id, aggregate_type))
    }
}
