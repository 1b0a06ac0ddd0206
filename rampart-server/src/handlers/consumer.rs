use axum::{extract::State, response::Json};
use tracing::info;

use rampart_model::api::ConsumerStatusResponse;

use crate::infra::{app_state::AppState, errors::ApiResult};

/// Resume job consumption. Idempotent; the response reflects the state
/// after the call either way.
pub async fn start_consumer(
    State(state): State<AppState>,
) -> ApiResult<Json<ConsumerStatusResponse>> {
    if state.controller.start() {
        info!("consumer started via api");
    }
    status_body(&state).await
}

/// Pause consumption without aborting anything in flight; claimed jobs run
/// to their terminal states while new deliveries wait in the queue.
pub async fn stop_consumer(
    State(state): State<AppState>,
) -> ApiResult<Json<ConsumerStatusResponse>> {
    if state.controller.stop() {
        info!("consumer stopped via api");
    }
    status_body(&state).await
}

/// Consumer flag plus the two gauges operators watch while draining.
pub async fn consumer_status(
    State(state): State<AppState>,
) -> ApiResult<Json<ConsumerStatusResponse>> {
    status_body(&state).await
}

async fn status_body(state: &AppState) -> ApiResult<Json<ConsumerStatusResponse>> {
    let queue_depth = state.broker.depth().await?;
    Ok(Json(ConsumerStatusResponse {
        running: state.controller.is_running(),
        in_flight: state.controller.in_flight() as usize,
        queue_depth: queue_depth as usize,
    }))
}
