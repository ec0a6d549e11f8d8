use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::models::payment::Processor;

pub async fn get_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let metrics = &state.metrics;
    let monitor = &state.monitor;

    let processor_status = |processor: Processor| {
        serde_json::json!({
            "failing": monitor.is_failing(processor),
            "minResponseTime": monitor.min_response_ms(processor),
        })
    };

    Json(serde_json::json!({
        "accepted": metrics.get_accepted(),
        "processed": metrics.get_processed(),
        "duplicates": metrics.get_duplicates(),
        "rejected": metrics.get_rejected(),
        "dropped": metrics.get_dropped(),
        "admission_timeouts": metrics.get_admission_timeouts(),
        "processors": {
            "default": processor_status(Processor::Default),
            "fallback": processor_status(Processor::Fallback),
        }
    }))
}
