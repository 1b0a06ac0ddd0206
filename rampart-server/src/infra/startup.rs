use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use rampart_core::{
    broker::{InProcessBroker, QueueBroker, RedisBroker},
    capability::CapabilityRegistry,
    controller::ConsumerController,
    dispatcher::JobDispatcher,
    runtime::{WorkerRuntime, WorkerRuntimeBuilder},
    store::{JobStore, SqliteJobStore},
};

use crate::infra::{app_state::AppState, config::ServerConfig};

/// Everything `run_server` needs after wiring: the request state plus the
/// worker runtime whose shutdown the binary owns.
pub struct ResourceBootstrap {
    pub state: AppState,
    pub runtime: WorkerRuntime,
}

/// Connect the store, pick a queue backend, start the embedded worker
/// runtime, and assemble the shared request state.
pub async fn wire_pipeline(config: Arc<ServerConfig>) -> anyhow::Result<ResourceBootstrap> {
    let store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::connect(&config.database_url)
            .await
            .with_context(|| {
                format!("failed to open job store at {}", config.database_url)
            })?,
    );

    let broker: Arc<dyn QueueBroker> = match &config.redis_url {
        Some(url) => {
            let broker = RedisBroker::connect(url, &config.queue_namespace)
                .await
                .context("failed to connect to redis")?;
            info!(namespace = %config.queue_namespace, "queueing through redis");
            Arc::new(broker)
        }
        None => {
            info!("queueing in process; queued jobs do not survive a restart");
            Arc::new(InProcessBroker::new())
        }
    };

    let dispatcher = Arc::new(JobDispatcher::new(store.clone(), broker.clone()));
    let controller = ConsumerController::new(!config.start_paused);

    let runtime = WorkerRuntimeBuilder::new(config.pipeline.clone())
        .with_store(store.clone())
        .with_broker(broker.clone())
        .with_capabilities(Arc::new(CapabilityRegistry::builtin()?))
        .with_controller(controller.clone())
        .build()?;
    runtime.start().await;

    let state = AppState {
        config,
        store,
        broker,
        dispatcher,
        controller,
    };

    Ok(ResourceBootstrap { state, runtime })
}
