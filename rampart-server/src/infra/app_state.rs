use std::{fmt, sync::Arc};

use rampart_core::{
    broker::QueueBroker, controller::ConsumerController, dispatcher::JobDispatcher,
    store::JobStore,
};

use crate::infra::config::ServerConfig;

/// Shared handles every request handler can reach.
///
/// The worker runtime itself is deliberately not in here; handlers steer it
/// through the [`ConsumerController`] and observe it through the store and
/// broker.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn JobStore>,
    pub broker: Arc<dyn QueueBroker>,
    pub dispatcher: Arc<JobDispatcher>,
    pub controller: ConsumerController,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
