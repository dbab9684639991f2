//! End-to-end scenarios over the full in-memory pipeline: outbox relays,
//! broker, consumer loops, and the billing driver all running.

use std::time::Duration;

use chrono::Utc;
use common::{Currency, DeliveryMethod, PaymentMethod, ProductId, UserId};
use inventory::InventoryRepository;
use messaging::{RelayConfig, ShutdownSignal};
use order::{NewOrder, OrderLine, OrderStatus};
use payment::{BillingWorkerConfig, PaymentRepository, PaymentStatus};

struct Pipeline {
    stack: api::InMemoryStack,
    signal: ShutdownSignal,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl Pipeline {
    fn start() -> Self {
        let stack = api::InMemoryStack::new();
        let (signal, shutdown) = ShutdownSignal::new();
        let workers = stack.spawn_workers(
            RelayConfig {
                tick: Duration::from_millis(10),
                batch_size: 10,
            },
            BillingWorkerConfig {
                tick: Duration::from_millis(10),
                batch_size: 10,
                charge_timeout: Duration::from_secs(1),
            },
            shutdown,
        );
        Self {
            stack,
            signal,
            workers,
        }
    }

    async fn stop(self) {
        self.signal.trigger();
        self.stack.broker.close();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("not reached within 5s: {what}");
}

fn order_request(product_id: ProductId, quantity: u64) -> NewOrder {
    NewOrder {
        user_id: UserId::new(),
        currency: Currency::Usd,
        total_price: 100.0,
        payment_method: PaymentMethod::Card,
        delivery_method: DeliveryMethod::Pickup,
        delivery_address: "1 Main St".to_string(),
        delivery_date: Utc::now() + chrono::Duration::days(3),
        items: vec![OrderLine {
            product_id,
            quantity,
        }],
        coupon: None,
    }
}

#[tokio::test]
async fn happy_purchase_reaches_paid_with_stock_consumed() {
    let pipeline = Pipeline::start();
    let product_id = ProductId::new();
    pipeline.stack.inventory_repo.seed(product_id, 5, 0);

    let order = pipeline
        .stack
        .orders
        .create_order(order_request(product_id, 2))
        .await
        .unwrap();

    // Reservation: (5,0) → (3,2).
    {
        let repo = pipeline.stack.inventory_repo.clone();
        eventually("stock locked", move || {
            let repo = repo.clone();
            async move {
                repo.get(product_id)
                    .await
                    .unwrap()
                    .is_some_and(|item| (item.available, item.reserved) == (3, 2))
            }
        })
        .await;
    }

    // Billing settles, order becomes paid.
    {
        let orders = pipeline.stack.orders.clone();
        eventually("order paid", move || {
            let orders = orders.clone();
            async move {
                orders.get_order(order.id).await.unwrap().status == OrderStatus::Paid
            }
        })
        .await;
    }

    // Reservation consumed: (3,2) → (3,0).
    {
        let repo = pipeline.stack.inventory_repo.clone();
        eventually("reservation consumed", move || {
            let repo = repo.clone();
            async move {
                repo.get(product_id)
                    .await
                    .unwrap()
                    .is_some_and(|item| (item.available, item.reserved) == (3, 0))
            }
        })
        .await;
    }

    // The payment record completed and carries a redirect URL.
    let payment = pipeline
        .stack
        .payment_repo
        .get_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(!payment.redirect_url.is_empty());

    // Operator completes the paid order.
    let completed = pipeline.stack.orders.complete_order(order.id).await.unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);

    pipeline.stop().await;
}

#[tokio::test]
async fn billing_failure_cancels_the_order_and_releases_stock() {
    let pipeline = Pipeline::start();
    let product_id = ProductId::new();
    pipeline.stack.inventory_repo.seed(product_id, 5, 0);
    pipeline.stack.biller.set_fail_on_charge(true);

    let order = pipeline
        .stack
        .orders
        .create_order(order_request(product_id, 2))
        .await
        .unwrap();

    // payment-failed propagates: order cancelled.
    {
        let orders = pipeline.stack.orders.clone();
        eventually("order cancelled", move || {
            let orders = orders.clone();
            async move {
                orders.get_order(order.id).await.unwrap().status == OrderStatus::Cancelled
            }
        })
        .await;
    }

    // quantity-released restores the stock: (3,2) → (5,0).
    {
        let repo = pipeline.stack.inventory_repo.clone();
        eventually("stock released", move || {
            let repo = repo.clone();
            async move {
                repo.get(product_id)
                    .await
                    .unwrap()
                    .is_some_and(|item| (item.available, item.reserved) == (5, 0))
            }
        })
        .await;
    }

    let payment = pipeline
        .stack
        .payment_repo
        .get_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    pipeline.stop().await;
}

#[tokio::test]
async fn retry_after_billing_failure_completes_the_payment() {
    let pipeline = Pipeline::start();
    let product_id = ProductId::new();
    pipeline.stack.inventory_repo.seed(product_id, 5, 0);
    pipeline.stack.biller.set_fail_on_charge(true);

    let order = pipeline
        .stack
        .orders
        .create_order(order_request(product_id, 2))
        .await
        .unwrap();

    let payment_repo = pipeline.stack.payment_repo.clone();
    {
        let repo = payment_repo.clone();
        eventually("payment failed", move || {
            let repo = repo.clone();
            async move {
                repo.get_by_order(order.id)
                    .await
                    .unwrap()
                    .is_some_and(|p| p.status == PaymentStatus::Failed)
            }
        })
        .await;
    }

    let payment = payment_repo.get_by_order(order.id).await.unwrap().unwrap();
    pipeline.stack.biller.set_fail_on_charge(false);
    pipeline
        .stack
        .payments
        .retry_payment(payment.id, payment.user_id)
        .await
        .unwrap();

    {
        let repo = payment_repo.clone();
        eventually("payment completed after retry", move || {
            let repo = repo.clone();
            async move {
                repo.get(payment.id)
                    .await
                    .unwrap()
                    .is_some_and(|p| p.status == PaymentStatus::Completed)
            }
        })
        .await;
    }

    pipeline.stop().await;
}

#[tokio::test]
async fn insufficient_stock_leaves_inventory_untouched() {
    let pipeline = Pipeline::start();
    let product_id = ProductId::new();
    pipeline.stack.inventory_repo.seed(product_id, 1, 0);

    let order = pipeline
        .stack
        .orders
        .create_order(order_request(product_id, 2))
        .await
        .unwrap();

    // Wait until the relay has drained both intents.
    {
        let outbox = pipeline.stack.order_repo.outbox().clone();
        eventually("order outbox drained", move || {
            let outbox = outbox.clone();
            async move { outbox.unprocessed_count() == 0 }
        })
        .await;
    }

    // The order-created intent still reaches the payment service.
    {
        let repo = pipeline.stack.payment_repo.clone();
        eventually("payment created", move || {
            let repo = repo.clone();
            async move { repo.get_by_order(order.id).await.unwrap().is_some() }
        })
        .await;
    }

    // Give the quantity-requested message time to be consumed and rejected.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let item = pipeline
        .stack
        .inventory_repo
        .get(product_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((item.available, item.reserved), (1, 0));

    pipeline.stop().await;
}

#[tokio::test]
async fn user_cancel_before_payment_releases_stock_and_cancels_payment() {
    let pipeline = Pipeline::start();
    let product_id = ProductId::new();
    pipeline.stack.inventory_repo.seed(product_id, 5, 0);
    // Slow billing so the user cancellation wins the race.
    pipeline.stack.biller.set_delay(Duration::from_millis(300));

    let order = pipeline
        .stack
        .orders
        .create_order(order_request(product_id, 2))
        .await
        .unwrap();

    pipeline.stack.orders.cancel_order(order.id).await.unwrap();

    // The cancellation reaches the payment service before billing settles.
    {
        let repo = pipeline.stack.payment_repo.clone();
        eventually("payment cancelled", move || {
            let repo = repo.clone();
            async move {
                repo.get_by_order(order.id)
                    .await
                    .unwrap()
                    .is_some_and(|p| p.status == PaymentStatus::Cancelled)
            }
        })
        .await;
    }

    // quantity-requested then quantity-released: net (5,0) once the
    // release has been consumed.
    {
        let outbox = pipeline.stack.order_repo.outbox().clone();
        eventually("order outbox drained", move || {
            let outbox = outbox.clone();
            async move { outbox.unprocessed_count() == 0 }
        })
        .await;
    }
    {
        let repo = pipeline.stack.inventory_repo.clone();
        eventually("stock back to baseline", move || {
            let repo = repo.clone();
            async move {
                repo.get(product_id)
                    .await
                    .unwrap()
                    .is_some_and(|item| (item.available, item.reserved) == (5, 0))
            }
        })
        .await;
    }

    let released = pipeline
        .stack
        .order_repo
        .outbox()
        .rows()
        .iter()
        .any(|row| row.event_type == "quantity-released");
    assert!(released);

    pipeline.stop().await;
}
