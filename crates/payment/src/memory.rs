//! In-memory repository for tests and the single-process binary.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId};
use messaging::{DedupKey, InMemoryOutboxStore, OutboxRecord};
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::model::Payment;
use crate::repository::{CreateOutcome, PaymentRepository, PaymentTransition};
use crate::status::PaymentStatus;

#[derive(Default)]
struct State {
    payments: HashMap<PaymentId, Payment>,
    processed: HashSet<(String, Uuid)>,
}

/// In-memory payment repository writing its outbox rows into an
/// [`InMemoryOutboxStore`] so the relay can drain them.
#[derive(Clone)]
pub struct InMemoryPaymentRepository {
    state: Arc<Mutex<State>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryPaymentRepository {
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            outbox,
        }
    }

    /// The outbox store this repository appends to.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn create(&self, payment: &Payment, dedup: Option<DedupKey>) -> Result<CreateOutcome> {
        let mut state = self.state.lock().unwrap();

        if let Some(key) = &dedup {
            if state
                .processed
                .contains(&(key.consumer_group.clone(), key.message_id))
            {
                return Ok(CreateOutcome::Duplicate);
            }
        }

        if state
            .payments
            .values()
            .any(|existing| existing.order_id == payment.order_id)
        {
            return Err(PaymentError::AlreadyExists {
                order_id: payment.order_id,
            });
        }

        state.payments.insert(payment.id, payment.clone());
        if let Some(key) = dedup {
            state.processed.insert((key.consumer_group, key.message_id));
        }
        Ok(CreateOutcome::Created)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.lock().unwrap().payments.get(&id).cloned())
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .values()
            .find(|payment| payment.order_id == order_id)
            .cloned())
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<Payment> = state
            .payments
            .values()
            .filter(|payment| payment.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|payment| payment.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn transition(
        &self,
        id: PaymentId,
        target: PaymentStatus,
        redirect_url: Option<&str>,
        outbox: &[OutboxRecord],
        dedup: Option<DedupKey>,
    ) -> Result<PaymentTransition> {
        let mut state = self.state.lock().unwrap();

        if let Some(key) = &dedup {
            if state
                .processed
                .contains(&(key.consumer_group.clone(), key.message_id))
            {
                return Ok(PaymentTransition::Duplicate);
            }
        }

        let payment = state
            .payments
            .get_mut(&id)
            .ok_or(PaymentError::NotFound(id))?;
        payment.status.check_transition(target, id)?;

        payment.status = target;
        if let Some(url) = redirect_url {
            payment.redirect_url = url.to_string();
        }
        payment.updated_at = Utc::now();
        let updated = payment.clone();

        for record in outbox {
            self.outbox.append(record.clone());
        }
        if let Some(key) = dedup {
            state.processed.insert((key.consumer_group, key.message_id));
        }
        Ok(PaymentTransition::Applied(updated))
    }
}
