pub mod payment_queue;

pub use payment_queue::{EnqueueError, PaymentQueue, QueueItem, WorkerPool};
