//! HTTP control plane for the Rampart assessment pipeline.
//!
//! The binary wires configuration, the job store, the queue broker, and the
//! embedded worker runtime, then serves the routes defined here. The library
//! surface exists so integration tests can assemble the same app on top of
//! in-memory backends.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Assemble the application router: public health probe, versioned API,
/// and the middleware stack.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::health::ping_handler))
        .route("/health", get(handlers::health::health_handler))
        .merge(routes::create_api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use rampart_core::broker::memory::InProcessBroker;
    use rampart_core::controller::ConsumerController;
    use rampart_core::dispatcher::JobDispatcher;
    use rampart_core::store::sqlite::SqliteJobStore;

    use super::*;
    use crate::infra::config::ServerConfig;

    async fn app_on_memory_backends() -> Router {
        let store = Arc::new(
            SqliteJobStore::connect("sqlite::memory:")
                .await
                .expect("in-memory store"),
        );
        let broker = Arc::new(InProcessBroker::new());
        let dispatcher = Arc::new(JobDispatcher::new(store.clone(), broker.clone()));
        create_app(AppState {
            config: Arc::new(ServerConfig::default()),
            store,
            broker,
            dispatcher,
            controller: ConsumerController::default(),
        })
    }

    #[tokio::test]
    async fn ping_answers_without_touching_backends() {
        let app = app_on_memory_backends().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_fall_through_to_not_found() {
        let app = app_on_memory_backends().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/findings")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
