//! PostgreSQL-backed payment repository.

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId, UserId};
use messaging::dedup::claim_tx;
use messaging::outbox::insert_record_tx;
use messaging::{DedupKey, OutboxRecord};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{PaymentError, Result};
use crate::model::Payment;
use crate::repository::{CreateOutcome, PaymentRepository, PaymentTransition};
use crate::status::PaymentStatus;

const OUTBOX_TABLE: &str = "payment_outbox";

/// Payment repository over the `payments` and `payment_outbox` tables.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status_raw: String = row.try_get("status")?;
        let status = PaymentStatus::parse(&status_raw)
            .ok_or_else(|| decode_err(format!("unknown payment status {status_raw:?}")))?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get("id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            currency: parse_column(row.try_get::<String, _>("currency")?)?,
            total_price: row.try_get("total_price")?,
            status,
            payment_method: parse_column(row.try_get::<String, _>("payment_method")?)?,
            description: row.try_get("description")?,
            redirect_url: row.try_get("redirect_url")?,
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

fn decode_err(message: String) -> PaymentError {
    PaymentError::Database(sqlx::Error::Decode(message.into()))
}

const SELECT_PAYMENT: &str = "SELECT id, user_id, order_id, currency, total_price, status, \
     payment_method, description, redirect_url, created_at, updated_at FROM payments";

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn create(&self, payment: &Payment, dedup: Option<DedupKey>) -> Result<CreateOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &dedup {
            if !claim_tx(&mut tx, key).await? {
                tx.rollback().await?;
                return Ok(CreateOutcome::Duplicate);
            }
        }

        let result = sqlx::query(
            "INSERT INTO payments (id, user_id, order_id, currency, total_price, status, \
             payment_method, description, redirect_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.currency.as_str())
        .bind(payment.total_price)
        .bind(payment.status.as_str())
        .bind(payment.payment_method.as_str())
        .bind(&payment.description)
        .bind(&payment.redirect_url)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = result {
            // The unique order_id constraint is the duplicate-payment guard.
            if let sqlx::Error::Database(ref db_err) = err {
                if db_err.constraint() == Some("payments_order_id_key") {
                    return Err(PaymentError::AlreadyExists {
                        order_id: payment.order_id,
                    });
                }
            }
            return Err(PaymentError::Database(err));
        }

        tx.commit().await?;
        Ok(CreateOutcome::Created)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE order_id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "{SELECT_PAYMENT} WHERE status = 'pending' ORDER BY created_at ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn transition(
        &self,
        id: PaymentId,
        target: PaymentStatus,
        redirect_url: Option<&str>,
        outbox: &[OutboxRecord],
        dedup: Option<DedupKey>,
    ) -> Result<PaymentTransition> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &dedup {
            if !claim_tx(&mut tx, key).await? {
                tx.rollback().await?;
                return Ok(PaymentTransition::Duplicate);
            }
        }

        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let mut payment = row
            .map(Self::row_to_payment)
            .transpose()?
            .ok_or(PaymentError::NotFound(id))?;

        payment.status.check_transition(target, id)?;
        payment.status = target;
        if let Some(url) = redirect_url {
            payment.redirect_url = url.to_string();
        }
        payment.updated_at = Utc::now();

        sqlx::query(
            "UPDATE payments SET status = $2, redirect_url = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.redirect_url)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        for record in outbox {
            insert_record_tx(&mut tx, OUTBOX_TABLE, record).await?;
        }

        tx.commit().await?;
        Ok(PaymentTransition::Applied(payment))
    }
}
