use anyhow::Result;
use uuid::Uuid;

const CLAIM_TTL_SECS: u64 = 7200;

/// Atomic set-if-absent on the correlation id. This is the only
/// serialization point that prevents double ledger writes, across workers
/// and across gateway instances sharing the same Redis.
#[derive(Clone)]
pub struct IdempotencyRegistry {
    client: redis::Client,
}

impl IdempotencyRegistry {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn claim_key(correlation_id: &Uuid) -> String {
        format!("paid:{correlation_id}")
    }

    /// Returns true iff this caller won the claim. A false return means the
    /// payment has been, or is being, handled elsewhere.
    pub async fn try_claim(&self, correlation_id: &Uuid) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::claim_key(correlation_id))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(CLAIM_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_key_is_namespaced_by_correlation_id() {
        let id: Uuid = "4a7901b8-7d0d-4d9b-aa9d-9c37b57e0a55".parse().unwrap();
        assert_eq!(
            IdempotencyRegistry::claim_key(&id),
            "paid:4a7901b8-7d0d-4d9b-aa9d-9c37b57e0a55"
        );
    }
}
