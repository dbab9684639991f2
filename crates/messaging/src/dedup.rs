//! Processed-message bookkeeping for idempotent consumers.
//!
//! The broker delivers at-least-once; the inventory command set is not
//! intrinsically idempotent. Each consumer therefore records the message
//! key in `processed_messages` inside the same transaction as the domain
//! write; a duplicate key means the write already happened and the message
//! is acknowledged without reapplying.

use uuid::Uuid;

/// Identity of one consumed message for one consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey {
    pub consumer_group: String,
    pub message_id: Uuid,
}

impl DedupKey {
    pub fn new(consumer_group: impl Into<String>, message_id: Uuid) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            message_id,
        }
    }
}

/// Claims `key` inside the caller's transaction.
///
/// Returns `false` when the key was already recorded, in which case the
/// caller must skip its write and roll nothing back.
pub async fn claim_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    key: &DedupKey,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO processed_messages (consumer_group, message_id) \
         VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(&key.consumer_group)
    .bind(key.message_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}
