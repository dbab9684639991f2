//! Transactional outbox records and stores.
//!
//! Each writing service owns an outbox table; rows are inserted in the same
//! transaction as the aggregate write that produced them and published by
//! the relay afterwards. A row is unpublished iff `processed_at` is null.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{MessagingError, Result};
use crate::event::EventType;

/// One pending (or published) domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub topic: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Builds an unprocessed record for `event_type` on its canonical topic.
    pub fn for_event<P: Serialize>(event_type: EventType, payload: &P) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            topic: event_type.topic().to_string(),
            event_type: event_type.as_str().to_string(),
            payload: serde_json::to_value(payload)?,
            created_at: Utc::now(),
            processed_at: None,
        })
    }

    /// Returns true if the relay has not published this row yet.
    pub fn is_unprocessed(&self) -> bool {
        self.processed_at.is_none()
    }
}

/// Store the relay drains: oldest unprocessed rows first.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Reads up to `limit` unprocessed rows in `created_at` order.
    async fn fetch_unprocessed(&self, limit: i64) -> Result<Vec<OutboxRecord>>;

    /// Marks a row as published. Set only after broker acknowledgement.
    async fn mark_processed(&self, id: Uuid) -> Result<()>;
}

/// PostgreSQL-backed outbox store over a service's outbox table.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    table: &'static str,
}

impl PostgresOutboxStore {
    /// Creates a store over the given outbox table (`order_outbox`,
    /// `payment_outbox`).
    pub fn new(pool: PgPool, table: &'static str) -> Self {
        Self { pool, table }
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        Ok(OutboxRecord {
            id: row.try_get("id").map_err(MessagingError::Database)?,
            topic: row.try_get("topic").map_err(MessagingError::Database)?,
            event_type: row
                .try_get("event_type")
                .map_err(MessagingError::Database)?,
            payload: row.try_get("payload").map_err(MessagingError::Database)?,
            created_at: row
                .try_get("created_at")
                .map_err(MessagingError::Database)?,
            processed_at: row
                .try_get("processed_at")
                .map_err(MessagingError::Database)?,
        })
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn fetch_unprocessed(&self, limit: i64) -> Result<Vec<OutboxRecord>> {
        let sql = format!(
            "SELECT id, topic, event_type, payload, created_at, processed_at \
             FROM {} WHERE processed_at IS NULL ORDER BY created_at ASC LIMIT $1",
            self.table
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        let sql = format!("UPDATE {} SET processed_at = now() WHERE id = $1", self.table);
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

/// Inserts a record within the caller's transaction.
///
/// Used by the repositories so the aggregate write and its events commit
/// atomically.
pub async fn insert_record_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &str,
    record: &OutboxRecord,
) -> std::result::Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {table} (id, topic, event_type, payload, created_at, processed_at) \
         VALUES ($1, $2, $3, $4, $5, $6)"
    );
    sqlx::query(&sql)
        .bind(record.id)
        .bind(&record.topic)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.processed_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// In-memory outbox store for tests and the single-process binary.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    rows: Arc<Mutex<Vec<OutboxRecord>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record; the in-memory analogue of [`insert_record_tx`].
    pub fn append(&self, record: OutboxRecord) {
        self.rows.lock().unwrap().push(record);
    }

    /// Number of rows not yet published.
    pub fn unprocessed_count(&self) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_unprocessed())
            .count()
    }

    /// Snapshot of all rows (test observability).
    pub fn rows(&self) -> Vec<OutboxRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn fetch_unprocessed(&self, limit: i64) -> Result<Vec<OutboxRecord>> {
        let rows = self.rows.lock().unwrap();
        let mut unprocessed: Vec<OutboxRecord> = rows
            .iter()
            .filter(|r| r.is_unprocessed())
            .cloned()
            .collect();
        unprocessed.sort_by_key(|r| r.created_at);
        unprocessed.truncate(limit.max(0) as usize);
        Ok(unprocessed)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.processed_at = Some(Utc::now());
        }
        Ok(())
    }
}
