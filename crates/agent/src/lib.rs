//! Library surface for the Agent binary, split out from `main.rs` so the
//! tunnel/control logic can be driven by integration tests under `tests/`
//! with real loopback sockets instead of a mocked socket layer.

pub mod config;
pub mod control;
pub mod state;
pub mod tunnel;

use std::sync::Arc;

use config::AgentConfig;
use state::AgentState;
use tunnel_core::metrics::TracingMetrics;

/// Builds agent state and runs the persistent control loop. Never returns
/// under normal operation; reconnects with a fixed backoff on any loss.
pub async fn serve(config: AgentConfig) {
    if config.secret.is_empty() {
        tracing::warn!("no secret/claim-code/token configured; the Bridge will reject authentication");
    }
    let state = AgentState::new(config, Arc::new(TracingMetrics));
    control::run(state).await;
}
