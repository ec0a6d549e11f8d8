use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;

use crate::app::AppState;
use crate::models::payment::PaymentsSummary;
use crate::storage::ledger;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<PaymentsSummary>, StatusCode> {
    let from_ms = query.from.map(|bound| bound.timestamp_millis());
    let to_ms = query.to.map(|bound| bound.timestamp_millis());

    match state.ledger.range_by_score(from_ms, to_ms).await {
        Ok(records) => Ok(Json(ledger::summarize(&records))),
        Err(err) => {
            error!("summary query failed: {err:#}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
