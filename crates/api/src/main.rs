//! Process entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use inventory::{InventoryService, PostgresInventoryRepository};
use messaging::{InMemoryBroker, PostgresOutboxStore, ShutdownSignal};
use metrics_exporter_prometheus::PrometheusHandle;
use order::{OrderService, PostgresOrderRepository};
use payment::{InMemoryBillingProvider, PaymentService, PostgresPaymentRepository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("SIGINT received, shutting down");
        }
        () = terminate => {
            tracing::info!("SIGTERM received, shutting down");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.database_url.clone() {
        Some(url) => run_postgres(config, metrics_handle, &url).await,
        None => run_in_memory(config, metrics_handle).await,
    }
}

async fn run_in_memory(config: Config, metrics_handle: PrometheusHandle) {
    tracing::info!("no DATABASE_URL set, using in-memory stores");

    let stack = api::InMemoryStack::new();
    let (signal, shutdown) = ShutdownSignal::new();
    let workers = stack.spawn_workers(config.relay_config(), config.billing_config(), shutdown);
    let app = stack.app(metrics_handle);

    serve(app, &config).await;

    signal.trigger();
    stack.broker.close();
    for worker in workers {
        let _ = worker.await;
    }
    tracing::info!("server shut down gracefully");
}

async fn run_postgres(config: Config, metrics_handle: PrometheusHandle, url: &str) {
    // Startup database ping is bounded at 5s.
    let pool = tokio::time::timeout(
        Duration::from_secs(5),
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url),
    )
    .await
    .expect("database connect timed out")
    .expect("failed to connect to database");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    let broker = InMemoryBroker::new();
    let biller = InMemoryBillingProvider::new();
    let inventory_repo = PostgresInventoryRepository::new(pool.clone());
    let order_repo = PostgresOrderRepository::new(pool.clone());
    let payment_repo = PostgresPaymentRepository::new(pool.clone());
    let order_outbox = PostgresOutboxStore::new(pool.clone(), "order_outbox");
    let payment_outbox = PostgresOutboxStore::new(pool.clone(), "payment_outbox");

    let inventory_service = Arc::new(InventoryService::new(inventory_repo));
    let order_service = Arc::new(OrderService::new(order_repo));
    let payment_service = Arc::new(PaymentService::new(payment_repo.clone()));

    let (signal, shutdown) = ShutdownSignal::new();
    let workers = api::spawn_workers(
        &broker,
        inventory_service.clone(),
        order_service.clone(),
        payment_service.clone(),
        payment_repo,
        biller,
        order_outbox,
        payment_outbox,
        config.relay_config(),
        config.billing_config(),
        shutdown,
    );

    let app = api::create_app(
        inventory_service,
        order_service,
        payment_service,
        metrics_handle,
    );

    serve(app, &config).await;

    signal.trigger();
    broker.close();
    for worker in workers {
        let _ = worker.await;
    }
    tracing::info!("server shut down gracefully");
}

async fn serve(app: axum::Router, config: &Config) {
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}
