use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use tokio::time::Instant;

use crate::app::config::Config;
use crate::models::payment::{Processor, ProcessorPayload, ServiceHealth};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_IDLE_PER_HOST: usize = 100;

/// Result of a single processor POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Semantic refusal (4xx, notably 422). Not retryable.
    Rejected,
    ServerError,
    Transport,
    Timeout,
}

pub struct ProcessorClient {
    client: Client,
    default_url: String,
    fallback_url: String,
}

impl ProcessorClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            default_url: config.default_processor_url.clone(),
            fallback_url: config.fallback_processor_url.clone(),
        })
    }

    fn base_url(&self, processor: Processor) -> &str {
        match processor {
            Processor::Default => &self.default_url,
            Processor::Fallback => &self.fallback_url,
        }
    }

    /// Issues one POST, bounded by the caller's deadline on top of the
    /// client-wide request timeout.
    pub async fn post_payment(
        &self,
        processor: Processor,
        payload: &ProcessorPayload,
        deadline: Instant,
    ) -> Outcome {
        let request = self
            .client
            .post(format!("{}/payments", self.base_url(processor)))
            .json(payload)
            .send();

        match tokio::time::timeout_at(deadline, request).await {
            Err(_) => Outcome::Timeout,
            Ok(Err(err)) if err.is_timeout() => Outcome::Timeout,
            Ok(Err(_)) => Outcome::Transport,
            Ok(Ok(response)) => classify_status(response.status()),
        }
    }

    pub async fn service_health(&self, processor: Processor) -> Result<ServiceHealth> {
        let response = self
            .client
            .get(format!(
                "{}/payments/service-health",
                self.base_url(processor)
            ))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

fn classify_status(status: StatusCode) -> Outcome {
    if status.is_success() {
        Outcome::Success
    } else if status == StatusCode::REQUEST_TIMEOUT {
        Outcome::Timeout
    } else if status.is_client_error() {
        Outcome::Rejected
    } else {
        Outcome::ServerError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_map_to_success() {
        assert_eq!(classify_status(StatusCode::OK), Outcome::Success);
        assert_eq!(classify_status(StatusCode::CREATED), Outcome::Success);
    }

    #[test]
    fn unprocessable_is_a_semantic_rejection() {
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            Outcome::Rejected
        );
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Outcome::Rejected);
    }

    #[test]
    fn upstream_timeouts_and_errors_are_retryable() {
        assert_eq!(classify_status(StatusCode::REQUEST_TIMEOUT), Outcome::Timeout);
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Outcome::ServerError
        );
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), Outcome::ServerError);
    }
}
