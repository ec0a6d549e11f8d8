use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::models::payment::{ProcessedPayment, Processor, ProcessorPayload};
use crate::queue::payment_queue::QueueItem;
use crate::services::health_monitor::HealthMonitor;
use crate::services::metrics::PipelineMetrics;
use crate::services::processor_client::{Outcome, ProcessorClient};
use crate::storage::{IdempotencyRegistry, LedgerStore};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("rejected by {} processor", .0.as_str())]
    Rejected(Processor),
    #[error("attempt budget exhausted")]
    AttemptsExhausted,
    #[error("processing deadline elapsed")]
    DeadlineElapsed,
    #[error("idempotency claim failed")]
    Claim(#[source] anyhow::Error),
    #[error("ledger write failed after {} success", .processor.as_str())]
    LedgerWrite {
        processor: Processor,
        #[source]
        source: anyhow::Error,
    },
}

/// Runs the full lifecycle of one dequeued payment: idempotency claim,
/// processor selection, retries with failover, ledger write.
pub struct PaymentPipeline {
    ledger: LedgerStore,
    registry: IdempotencyRegistry,
    client: Arc<ProcessorClient>,
    monitor: Arc<HealthMonitor>,
    metrics: Arc<PipelineMetrics>,
}

impl PaymentPipeline {
    pub fn new(
        ledger: LedgerStore,
        registry: IdempotencyRegistry,
        client: Arc<ProcessorClient>,
        monitor: Arc<HealthMonitor>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            ledger,
            registry,
            client,
            monitor,
            metrics,
        }
    }

    /// Errors never escape the worker; everything after the 202 is logged
    /// here and accounted in the metrics.
    pub async fn handle(&self, item: QueueItem) {
        let correlation_id = item.payment.correlation_id;
        match self.process(item).await {
            Ok(true) => self.metrics.increment_processed(),
            Ok(false) => {
                self.metrics.increment_duplicates();
                info!("payment {correlation_id} already claimed, skipping");
            }
            Err(err @ ProcessError::Rejected(_)) => {
                self.metrics.increment_rejected();
                warn!("payment {correlation_id} {err}");
            }
            Err(ProcessError::LedgerWrite { processor, source }) => {
                self.metrics.increment_dropped();
                // The claim is already taken, so this payment cannot be
                // retried; it exists upstream but not in the ledger.
                error!(
                    "payment {correlation_id} settled by {} but lost to the ledger: {source:#}",
                    processor.as_str()
                );
            }
            Err(err) => {
                self.metrics.increment_dropped();
                warn!("payment {correlation_id} dropped: {err:#}");
            }
        }
    }

    /// Ok(true) = processed and recorded, Ok(false) = claim already taken.
    async fn process(&self, item: QueueItem) -> Result<bool, ProcessError> {
        let payment = item.payment;
        let claimed = self
            .registry
            .try_claim(&payment.correlation_id)
            .await
            .map_err(ProcessError::Claim)?;
        if !claimed {
            return Ok(false);
        }

        // requestedAt is fixed at the first attempt and reused on retries.
        let payload = ProcessorPayload {
            correlation_id: payment.correlation_id,
            amount: payment.amount,
            requested_at: Utc::now(),
        };

        let mut target = if self.monitor.should_use_default() {
            Processor::Default
        } else {
            Processor::Fallback
        };
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            let outcome = self.client.post_payment(target, &payload, item.deadline).await;
            match outcome {
                Outcome::Success => {
                    let record = ProcessedPayment {
                        correlation_id: payment.correlation_id,
                        amount: payment.amount,
                        processed_at: Utc::now(),
                        processor: target,
                    };
                    self.ledger.append(&record).await.map_err(|source| {
                        ProcessError::LedgerWrite {
                            processor: target,
                            source,
                        }
                    })?;
                    info!(
                        "payment {} processed by {} processor on attempt {attempt}",
                        payment.correlation_id,
                        target.as_str()
                    );
                    return Ok(true);
                }
                Outcome::Rejected => return Err(ProcessError::Rejected(target)),
                Outcome::ServerError | Outcome::Transport => self.monitor.report_failure(target),
                Outcome::Timeout => self.monitor.report_slowness(target),
            }
            target = next_target(target, &outcome);

            if attempt < MAX_ATTEMPTS {
                if Instant::now() + backoff >= item.deadline {
                    return Err(ProcessError::DeadlineElapsed);
                }
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(ProcessError::AttemptsExhausted)
    }
}

/// Failover rule: 5xx and transport errors flip the target, timeouts stay.
fn next_target(current: Processor, outcome: &Outcome) -> Processor {
    match outcome {
        Outcome::ServerError | Outcome::Transport => current.other(),
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_and_transport_flip_the_target() {
        assert_eq!(
            next_target(Processor::Default, &Outcome::ServerError),
            Processor::Fallback
        );
        assert_eq!(
            next_target(Processor::Default, &Outcome::Transport),
            Processor::Fallback
        );
        assert_eq!(
            next_target(Processor::Fallback, &Outcome::ServerError),
            Processor::Default
        );
    }

    #[test]
    fn timeout_keeps_the_same_target() {
        assert_eq!(
            next_target(Processor::Default, &Outcome::Timeout),
            Processor::Default
        );
        assert_eq!(
            next_target(Processor::Fallback, &Outcome::Timeout),
            Processor::Fallback
        );
    }

    #[test]
    fn backoff_doubles_across_the_attempt_budget() {
        let mut backoff = INITIAL_BACKOFF;
        let mut sleeps = Vec::new();
        for _ in 1..MAX_ATTEMPTS {
            sleeps.push(backoff.as_millis());
            backoff *= 2;
        }
        assert_eq!(sleeps, vec![100, 200]);
        assert_eq!(backoff.as_millis(), 400);
    }
}
