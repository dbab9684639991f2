//! PostgreSQL-backed inventory repository.

use async_trait::async_trait;
use common::ProductId;
use messaging::DedupKey;
use messaging::dedup::claim_tx;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::{InventoryError, Result};
use crate::item::InventoryItem;
use crate::op::Operation;
use crate::repository::{BatchOutcome, InventoryRepository, QuantityLine, sorted_lines};

/// Inventory repository over the `items` table.
///
/// Every write is a transactional read-modify-write: the row is read with
/// `FOR UPDATE`, mutated through the domain command, and written back, so
/// concurrent writers of the same product are serialized by the row lock.
#[derive(Clone)]
pub struct PostgresInventoryRepository {
    pool: PgPool,
}

impl PostgresInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn apply_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        product_id: ProductId,
        quantity: u64,
        op: Operation,
    ) -> Result<InventoryItem> {
        let row = sqlx::query(
            "SELECT available_quantity, reserved_quantity FROM items \
             WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        let mut item = match row {
            Some(row) => InventoryItem {
                product_id,
                available: row.try_get::<i64, _>("available_quantity")? as u64,
                reserved: row.try_get::<i64, _>("reserved_quantity")? as u64,
            },
            None if op.creates_row() => {
                sqlx::query(
                    "INSERT INTO items (product_id, available_quantity, reserved_quantity) \
                     VALUES ($1, 0, 0)",
                )
                .bind(product_id.as_uuid())
                .execute(&mut **tx)
                .await?;
                InventoryItem::new(product_id)
            }
            None => return Err(InventoryError::ProductNotFound { product_id }),
        };

        op.apply(&mut item, quantity)?;

        sqlx::query(
            "UPDATE items SET available_quantity = $2, reserved_quantity = $3 \
             WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .bind(item.available as i64)
        .bind(item.reserved as i64)
        .execute(&mut **tx)
        .await?;

        Ok(item)
    }
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn get(&self, product_id: ProductId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(
            "SELECT available_quantity, reserved_quantity FROM items WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(InventoryItem {
                product_id,
                available: row.try_get::<i64, _>("available_quantity")? as u64,
                reserved: row.try_get::<i64, _>("reserved_quantity")? as u64,
            }),
            None => None,
        })
    }

    async fn apply(
        &self,
        product_id: ProductId,
        quantity: u64,
        op: Operation,
    ) -> Result<InventoryItem> {
        let mut tx = self.pool.begin().await?;
        let item = Self::apply_in_tx(&mut tx, product_id, quantity, op).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn apply_many(
        &self,
        lines: &[QuantityLine],
        op: Operation,
        dedup: Option<DedupKey>,
    ) -> Result<BatchOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &dedup {
            if !claim_tx(&mut tx, key).await? {
                tx.rollback().await?;
                return Ok(BatchOutcome::Duplicate);
            }
        }

        for line in sorted_lines(lines) {
            Self::apply_in_tx(&mut tx, line.product_id, line.quantity, op).await?;
        }

        tx.commit().await?;
        Ok(BatchOutcome::Applied)
    }
}
