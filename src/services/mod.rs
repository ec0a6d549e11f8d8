pub mod health_monitor;
pub mod metrics;
pub mod payment_worker;
pub mod processor_client;

pub use health_monitor::HealthMonitor;
pub use metrics::PipelineMetrics;
pub use payment_worker::PaymentPipeline;
pub use processor_client::{Outcome, ProcessorClient};
