//! In-memory repository for tests and the single-process binary.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use messaging::{DedupKey, InMemoryOutboxStore, OutboxRecord};
use uuid::Uuid;

use crate::coupon::Coupon;
use crate::error::{OrderError, Result};
use crate::model::Order;
use crate::repository::{EventFactory, OrderRepository, TransitionOutcome};
use crate::status::OrderStatus;

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    coupons: HashMap<String, Coupon>,
    processed: HashSet<(String, Uuid)>,
}

/// In-memory order repository writing its outbox rows into an
/// [`InMemoryOutboxStore`] so the relay can drain them.
#[derive(Clone)]
pub struct InMemoryOrderRepository {
    state: Arc<Mutex<State>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryOrderRepository {
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            outbox,
        }
    }

    /// Seeds a coupon (test setup).
    pub fn seed_coupon(&self, coupon: Coupon) {
        self.state
            .lock()
            .unwrap()
            .coupons
            .insert(coupon.code.clone(), coupon);
    }

    /// The outbox store this repository appends to.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order, outbox: &[OutboxRecord]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.orders.insert(order.id, order.clone());
        for record in outbox {
            self.outbox.append(record.clone());
        }
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().unwrap().orders.get(&id).cloned())
    }

    async fn list(&self, user_id: Option<UserId>) -> Result<Vec<Order>> {
        let state = self.state.lock().unwrap();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| user_id.is_none_or(|user| order.user_id == user))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(OrderError::NotFound(order.id)),
        }
    }

    async fn delete(&self, id: OrderId) -> Result<bool> {
        Ok(self.state.lock().unwrap().orders.remove(&id).is_some())
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.state.lock().unwrap().coupons.get(code).cloned())
    }

    async fn transition(
        &self,
        id: OrderId,
        target: OrderStatus,
        action: &'static str,
        events: EventFactory<'_>,
        dedup: Option<DedupKey>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();

        if let Some(key) = &dedup {
            if state
                .processed
                .contains(&(key.consumer_group.clone(), key.message_id))
            {
                return Ok(TransitionOutcome::Duplicate);
            }
        }

        let order = state
            .orders
            .get_mut(&id)
            .ok_or(OrderError::NotFound(id))?;
        order.status.check_transition(target, action, id)?;

        let records = events(order)?;
        order.status = target;
        order.updated_at = Utc::now();
        let updated = order.clone();

        for record in records {
            self.outbox.append(record);
        }
        if let Some(key) = dedup {
            state.processed.insert((key.consumer_group, key.message_id));
        }
        Ok(TransitionOutcome::Applied(updated))
    }
}
