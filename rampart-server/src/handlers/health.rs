use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

/// Static liveness probe; touches no dependencies.
pub async fn ping_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Rampart is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness plus dependency probes for the store and the queue backend.
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, StatusCode> {
    let mut health_status = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    let mut is_unhealthy = false;

    match state.store.ping().await {
        Ok(()) => {
            health_status["checks"]["store"] = json!({ "status": "healthy" });
        }
        Err(err) => {
            health_status["checks"]["store"] = json!({
                "status": "unhealthy",
                "error": err.to_string(),
            });
            is_unhealthy = true;
        }
    }

    match state.broker.depth().await {
        Ok(depth) => {
            health_status["checks"]["queue"] = json!({
                "status": "healthy",
                "depth": depth,
            });
        }
        Err(err) => {
            health_status["checks"]["queue"] = json!({
                "status": "unhealthy",
                "error": err.to_string(),
            });
            is_unhealthy = true;
        }
    }

    if is_unhealthy {
        health_status["status"] = json!("unhealthy");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(Json(health_status))
    }
}
