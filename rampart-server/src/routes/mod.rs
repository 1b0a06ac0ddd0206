pub mod v1;

use axum::Router;

use crate::AppState;

/// Create the main API router with all versions
pub fn create_api_router() -> Router<AppState> {
    Router::new().nest("/api/v1", v1::create_v1_router())
    // Future versions can be added here:
    // .nest("/api/v2", v2::create_v2_router())
}
