use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::models::payment::PaymentRequest;
use crate::services::payment_worker::PaymentPipeline;

/// Budget for one payment's whole retry loop once admitted. Matches the
/// upstream client's total request timeout.
const PROCESSING_BUDGET: Duration = Duration::from_secs(30);

pub struct QueueItem {
    pub payment: PaymentRequest,
    pub deadline: Instant,
}

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("queue stayed full until the admission deadline")]
    Timeout,
    #[error("queue is closed")]
    Closed,
}

/// Producer half of the bounded payment queue. `enqueue` blocks on a full
/// queue, which is the backpressure the ingress path relies on.
#[derive(Clone)]
pub struct PaymentQueue {
    tx: mpsc::Sender<QueueItem>,
}

impl PaymentQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueueItem>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn enqueue(
        &self,
        payment: PaymentRequest,
        admission_deadline: Instant,
    ) -> Result<(), EnqueueError> {
        let item = QueueItem {
            payment,
            deadline: Instant::now() + PROCESSING_BUDGET,
        };
        match tokio::time::timeout_at(admission_deadline, self.tx.send(item)).await {
            Err(_) => Err(EnqueueError::Timeout),
            Ok(Err(_)) => Err(EnqueueError::Closed),
            Ok(Ok(())) => Ok(()),
        }
    }
}

pub struct WorkerPool {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        rx: mpsc::Receiver<QueueItem>,
        pipeline: Arc<PaymentPipeline>,
    ) -> Self {
        let count = count.max(1);
        let rx = Arc::new(Mutex::new(rx));

        let mut joins = Vec::with_capacity(count);
        for worker_id in 0..count {
            let rx = Arc::clone(&rx);
            let pipeline = Arc::clone(&pipeline);
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, pipeline).await;
            }));
        }
        info!("started {count} payment workers");

        Self { joins }
    }

    /// Workers drain until the producers are gone and the channel closes.
    /// Stragglers are aborted once the drain deadline passes.
    pub async fn shutdown(mut self, drain: Duration) {
        let joined =
            tokio::time::timeout(drain, futures::future::join_all(self.joins.iter_mut())).await;
        if joined.is_err() {
            warn!("drain deadline hit, aborting remaining workers");
            for join in &self.joins {
                join.abort();
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
    pipeline: Arc<PaymentPipeline>,
) {
    loop {
        let item = { rx.lock().await.recv().await };
        match item {
            Some(item) => pipeline.handle(item).await,
            None => break,
        }
    }
    info!("worker {worker_id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::Config;
    use crate::services::{HealthMonitor, PipelineMetrics, ProcessorClient};
    use crate::storage::{IdempotencyRegistry, LedgerStore};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn payment() -> PaymentRequest {
        PaymentRequest {
            correlation_id: Uuid::new_v4(),
            amount: Decimal::new(1000, 2),
        }
    }

    // Pipeline wired to addresses nothing listens on; every item fails fast
    // at the claim step, which is all these tests need.
    fn dead_end_pipeline(metrics: Arc<PipelineMetrics>) -> Arc<PaymentPipeline> {
        let redis = redis::Client::open("redis://127.0.0.1:1").unwrap();
        let mut config = Config::from_env();
        config.default_processor_url = "http://127.0.0.1:1".to_string();
        config.fallback_processor_url = "http://127.0.0.1:1".to_string();
        Arc::new(PaymentPipeline::new(
            LedgerStore::new(redis.clone()),
            IdempotencyRegistry::new(redis),
            Arc::new(ProcessorClient::new(&config).unwrap()),
            Arc::new(HealthMonitor::new()),
            metrics,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn admission_times_out_against_a_full_queue() {
        let (queue, _rx) = PaymentQueue::new(1);

        queue
            .enqueue(payment(), Instant::now() + Duration::from_secs(2))
            .await
            .unwrap();

        let result = queue
            .enqueue(payment(), Instant::now() + Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(EnqueueError::Timeout)));
    }

    #[tokio::test]
    async fn enqueue_fails_once_the_consumer_side_is_gone() {
        let (queue, rx) = PaymentQueue::new(1);
        drop(rx);

        let result = queue
            .enqueue(payment(), Instant::now() + Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(EnqueueError::Closed)));
    }

    #[tokio::test]
    async fn workers_drain_the_queue_and_stop_on_close() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (queue, rx) = PaymentQueue::new(16);
        let pool = WorkerPool::spawn(2, rx, dead_end_pipeline(Arc::clone(&metrics)));

        for _ in 0..3 {
            queue
                .enqueue(payment(), Instant::now() + Duration::from_secs(2))
                .await
                .unwrap();
        }
        drop(queue);

        pool.shutdown(Duration::from_secs(10)).await;
        assert_eq!(metrics.get_dropped(), 3);
    }
}
