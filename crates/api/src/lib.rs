//! HTTP surface and process wiring for the commerce services.
//!
//! One process hosts the three logical services (inventory, order, payment)
//! plus their workers: a consumer loop per service, an outbox relay per
//! writing service, and the billing driver. The services communicate only
//! through the broker and their own databases tables.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use inventory::{InventoryEventHandler, InventoryRepository, InventoryService};
use messaging::{
    ConsumerLoop, INVENTORY_TOPIC, InMemoryBroker, InMemoryOutboxStore, ORDER_TOPIC, OutboxRelay,
    OutboxStore, PAYMENT_TOPIC, RelayConfig, Shutdown,
};
use metrics_exporter_prometheus::PrometheusHandle;
use order::{InMemoryOrderRepository, OrderEventHandler, OrderRepository, OrderService};
use payment::{
    BillingProvider, BillingWorker, BillingWorkerConfig, InMemoryBillingProvider,
    InMemoryPaymentRepository, PaymentEventHandler, PaymentRepository, PaymentService,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creates the Axum application router with all routes.
pub fn create_app<I, O, P>(
    inventory: Arc<InventoryService<I>>,
    orders: Arc<OrderService<O>>,
    payments: Arc<PaymentService<P>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    I: InventoryRepository + 'static,
    O: OrderRepository + 'static,
    P: PaymentRepository + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(routes::inventory::router(inventory))
        .merge(routes::orders::router(orders))
        .merge(routes::payments::router(payments))
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Spawns the background workers: one consumer loop per service, one relay
/// per writing service, and the billing driver.
#[allow(clippy::too_many_arguments)]
pub fn spawn_workers<I, O, P, SO, SP, B>(
    broker: &InMemoryBroker,
    inventory: Arc<InventoryService<I>>,
    orders: Arc<OrderService<O>>,
    payments: Arc<PaymentService<P>>,
    payment_repo: P,
    biller: B,
    order_outbox: SO,
    payment_outbox: SP,
    relay_config: RelayConfig,
    billing_config: BillingWorkerConfig,
    shutdown: Shutdown,
) -> Vec<tokio::task::JoinHandle<()>>
where
    I: InventoryRepository + 'static,
    O: OrderRepository + 'static,
    P: PaymentRepository + 'static,
    SO: OutboxStore + 'static,
    SP: OutboxStore + 'static,
    B: BillingProvider + 'static,
{
    let mut handles = Vec::new();

    let consumer = broker.subscribe(inventory::CONSUMER_GROUP, &[INVENTORY_TOPIC]);
    handles.push(tokio::spawn(
        ConsumerLoop::new(
            "inventory",
            consumer,
            InventoryEventHandler::new(inventory),
            shutdown.clone(),
        )
        .run(),
    ));

    let consumer = broker.subscribe(payment::CONSUMER_GROUP, &[ORDER_TOPIC]);
    handles.push(tokio::spawn(
        ConsumerLoop::new(
            "payment",
            consumer,
            PaymentEventHandler::new(payments),
            shutdown.clone(),
        )
        .run(),
    ));

    let consumer = broker.subscribe(order::CONSUMER_GROUP, &[PAYMENT_TOPIC]);
    handles.push(tokio::spawn(
        ConsumerLoop::new(
            "order",
            consumer,
            OrderEventHandler::new(orders),
            shutdown.clone(),
        )
        .run(),
    ));

    handles.push(tokio::spawn(
        OutboxRelay::new(
            order_outbox,
            broker.clone(),
            relay_config.clone(),
            shutdown.clone(),
        )
        .run(),
    ));
    handles.push(tokio::spawn(
        OutboxRelay::new(
            payment_outbox,
            broker.clone(),
            relay_config,
            shutdown.clone(),
        )
        .run(),
    ));

    handles.push(tokio::spawn(
        BillingWorker::new(payment_repo, biller, billing_config, shutdown).run(),
    ));

    handles
}

/// The fully in-memory service stack: repositories, broker, and billing
/// provider wired together. Used by the binary without `DATABASE_URL` and
/// by the integration tests.
#[derive(Clone)]
pub struct InMemoryStack {
    pub broker: InMemoryBroker,
    pub biller: InMemoryBillingProvider,
    pub inventory_repo: inventory::InMemoryInventoryRepository,
    pub order_repo: InMemoryOrderRepository,
    pub payment_repo: InMemoryPaymentRepository,
    pub inventory: Arc<InventoryService<inventory::InMemoryInventoryRepository>>,
    pub orders: Arc<OrderService<InMemoryOrderRepository>>,
    pub payments: Arc<PaymentService<InMemoryPaymentRepository>>,
}

impl InMemoryStack {
    pub fn new() -> Self {
        let broker = InMemoryBroker::new();
        let biller = InMemoryBillingProvider::new();
        let inventory_repo = inventory::InMemoryInventoryRepository::new();
        let order_repo = InMemoryOrderRepository::new(InMemoryOutboxStore::new());
        let payment_repo = InMemoryPaymentRepository::new(InMemoryOutboxStore::new());

        Self {
            broker,
            biller,
            inventory: Arc::new(InventoryService::new(inventory_repo.clone())),
            orders: Arc::new(OrderService::new(order_repo.clone())),
            payments: Arc::new(PaymentService::new(payment_repo.clone())),
            inventory_repo,
            order_repo,
            payment_repo,
        }
    }

    /// Spawns the worker set over this stack.
    pub fn spawn_workers(
        &self,
        relay_config: RelayConfig,
        billing_config: BillingWorkerConfig,
        shutdown: Shutdown,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        spawn_workers(
            &self.broker,
            self.inventory.clone(),
            self.orders.clone(),
            self.payments.clone(),
            self.payment_repo.clone(),
            self.biller.clone(),
            self.order_repo.outbox().clone(),
            self.payment_repo.outbox().clone(),
            relay_config,
            billing_config,
            shutdown,
        )
    }

    /// Builds the router over this stack.
    pub fn app(&self, metrics_handle: PrometheusHandle) -> Router {
        create_app(
            self.inventory.clone(),
            self.orders.clone(),
            self.payments.clone(),
            metrics_handle,
        )
    }
}

impl Default for InMemoryStack {
    fn default() -> Self {
        Self::new()
    }
}
