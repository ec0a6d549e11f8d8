use anyhow::Result;
use redis::AsyncCommands;

use crate::models::payment::{PaymentsSummary, ProcessedPayment, Processor};

const LEDGER_KEY: &str = "payments";

/// Time-scored ledger of processed payments, backed by a Redis sorted set.
/// Scores are `processedAt` in epoch milliseconds; members are the JSON
/// records. Logical uniqueness per correlation id is enforced upstream by
/// the idempotency registry.
#[derive(Clone)]
pub struct LedgerStore {
    client: redis::Client,
}

impl LedgerStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub async fn append(&self, record: &ProcessedPayment) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let score = record.processed_at.timestamp_millis();
        let member = serde_json::to_string(record)?;
        let _: () = conn.zadd(LEDGER_KEY, member, score).await?;
        Ok(())
    }

    /// Inclusive range scan; absent bounds scan to -inf/+inf.
    pub async fn range_by_score(
        &self,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<ProcessedPayment>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let (min, max) = score_bounds(from_ms, to_ms);
        let members: Vec<String> = conn.zrangebyscore(LEDGER_KEY, min, max).await?;

        let mut records = Vec::with_capacity(members.len());
        for member in &members {
            records.push(serde_json::from_str(member)?);
        }
        Ok(records)
    }
}

fn score_bounds(from_ms: Option<i64>, to_ms: Option<i64>) -> (String, String) {
    let min = from_ms.map_or_else(|| "-inf".to_string(), |ms| ms.to_string());
    let max = to_ms.map_or_else(|| "+inf".to_string(), |ms| ms.to_string());
    (min, max)
}

pub fn summarize(records: &[ProcessedPayment]) -> PaymentsSummary {
    let mut summary = PaymentsSummary::default();
    for record in records {
        let side = match record.processor {
            Processor::Default => &mut summary.default,
            Processor::Fallback => &mut summary.fallback,
        };
        side.total_requests += 1;
        side.total_amount += record.amount;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn record(processor: Processor, amount: &str) -> ProcessedPayment {
        ProcessedPayment {
            correlation_id: Uuid::new_v4(),
            amount: amount.parse().unwrap(),
            processed_at: Utc::now(),
            processor,
        }
    }

    #[test]
    fn absent_bounds_scan_the_whole_set() {
        assert_eq!(
            score_bounds(None, None),
            ("-inf".to_string(), "+inf".to_string())
        );
        assert_eq!(
            score_bounds(Some(2000), Some(2000)),
            ("2000".to_string(), "2000".to_string())
        );
    }

    #[test]
    fn summarize_splits_by_processor() {
        let records = vec![
            record(Processor::Default, "10.00"),
            record(Processor::Default, "0.10"),
            record(Processor::Fallback, "5.00"),
        ];
        let summary = summarize(&records);

        assert_eq!(summary.default.total_requests, 2);
        assert_eq!(summary.default.total_amount, "10.10".parse::<Decimal>().unwrap());
        assert_eq!(summary.fallback.total_requests, 1);
        assert_eq!(summary.fallback.total_amount, "5.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn summarize_of_nothing_is_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.default.total_requests, 0);
        assert_eq!(summary.fallback.total_amount, Decimal::ZERO);
    }

    #[test]
    fn ledger_member_round_trips() {
        let original = record(Processor::Default, "19.90");
        let member = serde_json::to_string(&original).unwrap();
        let decoded: ProcessedPayment = serde_json::from_str(&member).unwrap();

        assert_eq!(decoded.correlation_id, original.correlation_id);
        assert_eq!(decoded.amount, original.amount);
        assert_eq!(decoded.processor, original.processor);
    }
}
