use std::env;
use std::thread;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub redis_endpoint: String,
    pub default_processor_url: String,
    pub fallback_processor_url: String,
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub request_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "9999".to_string())
                .parse()
                .unwrap_or(9999),
            redis_endpoint: env::var("REDIS_ENDPOINT")
                .unwrap_or_else(|_| "redis:6379".to_string()),
            default_processor_url: env::var("PAYMENT_PROCESSOR_URL_DEFAULT")
                .unwrap_or_else(|_| "http://payment-processor-default:8080".to_string()),
            fallback_processor_url: env::var("PAYMENT_PROCESSOR_URL_FALLBACK")
                .unwrap_or_else(|_| "http://payment-processor-fallback:8080".to_string()),
            queue_capacity: env::var("QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            worker_count: env::var("WORKER_COUNT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(default_worker_count),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
        }
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}", self.redis_endpoint)
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
