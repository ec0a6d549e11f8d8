use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::app::AppState;
use crate::models::payment::PaymentRequest;
use crate::queue::EnqueueError;

/// Admission only: the 202 is returned before any processor interaction.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> StatusCode {
    let deadline = Instant::now() + state.request_timeout;

    match state.queue.enqueue(request, deadline).await {
        Ok(()) => {
            state.metrics.increment_accepted();
            StatusCode::ACCEPTED
        }
        Err(EnqueueError::Timeout) => {
            state.metrics.increment_admission_timeouts();
            warn!("payment admission timed out, queue saturated");
            StatusCode::GATEWAY_TIMEOUT
        }
        Err(EnqueueError::Closed) => {
            error!("payment queue is closed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
