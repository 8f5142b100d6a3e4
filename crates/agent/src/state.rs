use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tunnel_core::limits;
use tunnel_core::Metrics;

use crate::config::AgentConfig;

pub struct AgentState {
    pub config: AgentConfig,
    /// The credential currently used to authenticate: starts out as
    /// `config.secret`, but is replaced with a Bridge-issued token the
    /// first time one comes back on `AUTH_OK` (a code is single-use and
    /// would fail on replay anyway, see the design notes).
    pub credential: Mutex<String>,
    pub active_connections: Arc<Semaphore>,
    pub metrics: Arc<dyn Metrics>,
}

impl AgentState {
    pub fn new(config: AgentConfig, metrics: Arc<dyn Metrics>) -> Arc<Self> {
        let credential = config.secret.clone();
        Arc::new(Self {
            config,
            credential: Mutex::new(credential),
            active_connections: Arc::new(Semaphore::new(limits::MAX_CONCURRENT_CONNECTIONS)),
            metrics,
        })
    }
}
