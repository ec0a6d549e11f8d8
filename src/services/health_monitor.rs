use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::payment::{Processor, ServiceHealth};
use crate::services::processor_client::ProcessorClient;

const POLL_INTERVAL: Duration = Duration::from_secs(6);
// Upstream allows one health call per 5s per endpoint.
const MIN_POLL_GAP_MS: i64 = 5_000;
const SLOW_FLOOR_MS: u64 = 1_000;

/// Shared view of both processors' health. All fields are plain atomics:
/// readers and writers race freely and stale reads are acceptable, so no
/// lock is held anywhere on the payment path.
pub struct HealthMonitor {
    default_failing: AtomicBool,
    fallback_failing: AtomicBool,
    default_min_response_ms: AtomicU64,
    fallback_min_response_ms: AtomicU64,
    last_poll_ms: AtomicI64,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            default_failing: AtomicBool::new(false),
            fallback_failing: AtomicBool::new(false),
            default_min_response_ms: AtomicU64::new(0),
            fallback_min_response_ms: AtomicU64::new(0),
            last_poll_ms: AtomicI64::new(0),
        }
    }

    fn failing(&self, processor: Processor) -> &AtomicBool {
        match processor {
            Processor::Default => &self.default_failing,
            Processor::Fallback => &self.fallback_failing,
        }
    }

    fn min_response(&self, processor: Processor) -> &AtomicU64 {
        match processor {
            Processor::Default => &self.default_min_response_ms,
            Processor::Fallback => &self.fallback_min_response_ms,
        }
    }

    /// Prefer default unless default is failing while fallback is healthy.
    /// Both failing still means default.
    pub fn should_use_default(&self) -> bool {
        let default_failing = self.default_failing.load(Ordering::Relaxed);
        let fallback_failing = self.fallback_failing.load(Ordering::Relaxed);
        !default_failing || fallback_failing
    }

    pub fn is_failing(&self, processor: Processor) -> bool {
        self.failing(processor).load(Ordering::Relaxed)
    }

    pub fn min_response_ms(&self, processor: Processor) -> u64 {
        self.min_response(processor).load(Ordering::Relaxed)
    }

    /// In-band feedback from a worker that saw a 5xx or transport error.
    pub fn report_failure(&self, processor: Processor) {
        self.failing(processor).store(true, Ordering::Relaxed);
    }

    /// In-band feedback from a worker that saw an attempt time out.
    pub fn report_slowness(&self, processor: Processor) {
        self.min_response(processor)
            .fetch_max(SLOW_FLOOR_MS, Ordering::Relaxed);
    }

    fn adopt(&self, processor: Processor, health: &ServiceHealth) {
        self.failing(processor).store(health.failing, Ordering::Relaxed);
        self.min_response(processor)
            .store(health.min_response_time, Ordering::Relaxed);
    }

    /// Background poll loop. Runs until shutdown is signalled.
    pub async fn run(
        self: Arc<Self>,
        client: Arc<ProcessorClient>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            // Gate against early timer fires; the upstream rate limit is
            // per endpoint, not per process restart of the ticker.
            let now_ms = Utc::now().timestamp_millis();
            if now_ms - self.last_poll_ms.load(Ordering::Relaxed) < MIN_POLL_GAP_MS {
                continue;
            }
            self.last_poll_ms.store(now_ms, Ordering::Relaxed);

            self.poll_once(&client).await;
        }
        info!("health monitor stopped");
    }

    async fn poll_once(&self, client: &ProcessorClient) {
        for processor in [Processor::Default, Processor::Fallback] {
            match client.service_health(processor).await {
                Ok(health) => {
                    if health.failing && !self.is_failing(processor) {
                        warn!("{} processor reports failing", processor.as_str());
                    }
                    self.adopt(processor, &health);
                }
                Err(err) => {
                    warn!(
                        "health check for {} processor failed: {err:#}",
                        processor.as_str()
                    );
                    self.report_failure(processor);
                }
            }
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_default_when_both_healthy() {
        let monitor = HealthMonitor::new();
        assert!(monitor.should_use_default());
    }

    #[test]
    fn switches_to_fallback_only_when_it_is_the_sole_healthy_one() {
        let monitor = HealthMonitor::new();
        monitor.report_failure(Processor::Default);
        assert!(!monitor.should_use_default());
    }

    #[test]
    fn both_failing_still_prefers_default() {
        let monitor = HealthMonitor::new();
        monitor.report_failure(Processor::Default);
        monitor.report_failure(Processor::Fallback);
        assert!(monitor.should_use_default());
    }

    #[test]
    fn fallback_failing_alone_keeps_default() {
        let monitor = HealthMonitor::new();
        monitor.report_failure(Processor::Fallback);
        assert!(monitor.should_use_default());
    }

    #[test]
    fn slowness_raises_min_response_to_the_floor() {
        let monitor = HealthMonitor::new();
        monitor.report_slowness(Processor::Default);
        assert_eq!(monitor.min_response_ms(Processor::Default), 1_000);
    }

    #[test]
    fn slowness_never_lowers_a_higher_observed_minimum() {
        let monitor = HealthMonitor::new();
        monitor.adopt(
            Processor::Fallback,
            &ServiceHealth {
                failing: false,
                min_response_time: 1_500,
            },
        );
        monitor.report_slowness(Processor::Fallback);
        assert_eq!(monitor.min_response_ms(Processor::Fallback), 1_500);
    }

    #[test]
    fn adopt_overwrites_the_snapshot() {
        let monitor = HealthMonitor::new();
        monitor.report_failure(Processor::Default);
        monitor.adopt(
            Processor::Default,
            &ServiceHealth {
                failing: false,
                min_response_time: 80,
            },
        );
        assert!(!monitor.is_failing(Processor::Default));
        assert_eq!(monitor.min_response_ms(Processor::Default), 80);
    }
}
