//! PostgreSQL-backed order repository.

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use messaging::dedup::claim_tx;
use messaging::outbox::insert_record_tx;
use messaging::{DedupKey, OutboxRecord};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::coupon::Coupon;
use crate::error::{OrderError, Result};
use crate::model::{Order, OrderLine};
use crate::repository::{EventFactory, OrderRepository, TransitionOutcome};
use crate::status::OrderStatus;

const OUTBOX_TABLE: &str = "order_outbox";

/// Order repository over the `orders`, `coupons`, and `order_outbox` tables.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw)
            .ok_or_else(|| decode_err(format!("unknown order status {status_raw:?}")))?;
        let items_json: serde_json::Value = row.try_get("items")?;
        let items: Vec<OrderLine> = serde_json::from_value(items_json)?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get("id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            status,
            currency: parse_column(row.try_get::<String, _>("currency")?)?,
            total_price: row.try_get("total_price")?,
            payment_method: parse_column(row.try_get::<String, _>("payment_method")?)?,
            delivery_method: parse_column(row.try_get::<String, _>("delivery_method")?)?,
            delivery_address: row.try_get("delivery_address")?,
            delivery_date: row.try_get("delivery_date")?,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn parse_column<T>(raw: String) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|e| decode_err(e.to_string()))
}

fn decode_err(message: String) -> OrderError {
    OrderError::Database(sqlx::Error::Decode(message.into()))
}

const SELECT_ORDER: &str = "SELECT id, user_id, status, currency, total_price, payment_method, \
     delivery_method, delivery_address, delivery_date, items, created_at, updated_at FROM orders";

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create(&self, order: &Order, outbox: &[OutboxRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, status, currency, total_price, payment_method, \
             delivery_method, delivery_address, delivery_date, items, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.currency.as_str())
        .bind(order.total_price)
        .bind(order.payment_method.as_str())
        .bind(order.delivery_method.as_str())
        .bind(&order.delivery_address)
        .bind(order.delivery_date)
        .bind(serde_json::to_value(&order.items)?)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for record in outbox {
            insert_record_tx(&mut tx, OUTBOX_TABLE, record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn list(&self, user_id: Option<UserId>) -> Result<Vec<Order>> {
        let rows = match user_id {
            Some(user) => {
                sqlx::query(&format!(
                    "{SELECT_ORDER} WHERE user_id = $1 ORDER BY created_at DESC"
                ))
                .bind(user.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{SELECT_ORDER} ORDER BY created_at DESC"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET delivery_address = $2, delivery_method = $3, \
             delivery_date = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(order.id.as_uuid())
        .bind(&order.delivery_address)
        .bind(order.delivery_method.as_str())
        .bind(order.delivery_date)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound(order.id));
        }
        Ok(())
    }

    async fn delete(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query("SELECT code, discount, valid_to, active FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(Coupon {
                code: row.try_get("code")?,
                discount: row.try_get("discount")?,
                valid_to: row.try_get("valid_to")?,
                active: row.try_get("active")?,
            }),
            None => None,
        })
    }

    async fn transition(
        &self,
        id: OrderId,
        target: OrderStatus,
        action: &'static str,
        events: EventFactory<'_>,
        dedup: Option<DedupKey>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &dedup {
            if !claim_tx(&mut tx, key).await? {
                tx.rollback().await?;
                return Ok(TransitionOutcome::Duplicate);
            }
        }

        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let mut order = row.map(Self::row_to_order).transpose()?.ok_or(OrderError::NotFound(id))?;

        order.status.check_transition(target, action, id)?;
        let records = events(&order)?;

        order.status = target;
        order.updated_at = Utc::now();

        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;

        for record in &records {
            insert_record_tx(&mut tx, OUTBOX_TABLE, record).await?;
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied(order))
    }
}
