mod app;
mod handlers;
mod models;
mod queue;
mod services;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use app::config::Config;
use app::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use queue::{PaymentQueue, WorkerPool};
use services::{HealthMonitor, PaymentPipeline, PipelineMetrics, ProcessorClient};
use storage::{IdempotencyRegistry, LedgerStore};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const MAX_BODY_BYTES: usize = 64 * 1024;
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    info!("starting rinha gateway on port {}", config.server_port);

    let redis_client =
        redis::Client::open(config.redis_url()).context("invalid redis endpoint")?;
    // Fail startup, not the first payment, when the store is unreachable.
    let mut conn = redis_client
        .get_multiplexed_async_connection()
        .await
        .context("redis connect failed")?;
    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("redis ping failed")?;
    drop(conn);

    let ledger = LedgerStore::new(redis_client.clone());
    let registry = IdempotencyRegistry::new(redis_client);
    let processor_client = Arc::new(ProcessorClient::new(&config)?);
    let monitor = Arc::new(HealthMonitor::new());
    let metrics = Arc::new(PipelineMetrics::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(Arc::clone(&monitor).run(Arc::clone(&processor_client), shutdown_rx));

    let (payment_queue, queue_rx) = PaymentQueue::new(config.queue_capacity);
    let pipeline = Arc::new(PaymentPipeline::new(
        ledger.clone(),
        registry,
        processor_client,
        Arc::clone(&monitor),
        Arc::clone(&metrics),
    ));
    let workers = WorkerPool::spawn(config.worker_count, queue_rx, pipeline);

    let state = AppState {
        queue: payment_queue.clone(),
        ledger,
        monitor,
        metrics,
        request_timeout: Duration::from_millis(config.request_timeout_ms),
    };

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/payments", post(handlers::payments::create_payment))
        .route(
            "/payments-summary",
            get(handlers::payments_summary::get_summary),
        )
        .route("/metrics", get(handlers::metrics::get_metrics))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static("rinha"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Ingress is closed; dropping the last producer lets workers drain out.
    info!("draining payment queue");
    drop(payment_queue);
    let _ = shutdown_tx.send(true);
    workers.shutdown(DRAIN_DEADLINE).await;
    info!("shutdown complete");

    Ok(())
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
