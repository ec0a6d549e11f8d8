pub mod config;

use std::sync::Arc;
use std::time::Duration;

use crate::queue::PaymentQueue;
use crate::services::{HealthMonitor, PipelineMetrics};
use crate::storage::LedgerStore;

#[derive(Clone)]
pub struct AppState {
    pub queue: PaymentQueue,
    pub ledger: LedgerStore,
    pub monitor: Arc<HealthMonitor>,
    pub metrics: Arc<PipelineMetrics>,
    pub request_timeout: Duration,
}
