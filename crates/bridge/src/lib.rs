//! Library surface for the Bridge binary, split out from `main.rs` purely so
//! the rendezvous logic can be driven by integration tests under `tests/`
//! with real loopback sockets instead of a mocked socket layer.

pub mod auth;
pub mod config;
pub mod connection;
pub mod state;

use std::sync::Arc;
use std::time::SystemTime;

use tokio::net::TcpListener;
use tunnel_core::limits;
use tunnel_core::metrics::TracingMetrics;

use config::BridgeConfig;
use state::BridgeState;

/// Binds the listener and runs the accept loop until the process is killed
/// or the listener itself fails. Mirrors `valence_network::connect::do_accept_loop`.
pub async fn serve(config: BridgeConfig) -> anyhow::Result<()> {
    if config.auth.enabled && config.auth.secret.is_empty() {
        tracing::warn!("auth.enabled is set but no auth.secret/BRIDGE_SECRET is configured");
    }

    let bind_addr = (config.bind, config.port).into();
    let state = BridgeState::new(config, Arc::new(TracingMetrics));

    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%bind_addr, error = %e, "failed to start TCP listener");
            return Err(e.into());
        }
    };
    tracing::info!(%bind_addr, "bridge listening");

    tokio::spawn(sweep_ip_states(state.clone()));

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::warn!(error = %e, "failed to set TCP_NODELAY");
                }
                let state = state.clone();
                tokio::spawn(async move {
                    connection::handle_connection(state, stream, peer_addr).await;
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to accept incoming connection");
            }
        }
    }
}

async fn sweep_ip_states(state: Arc<BridgeState>) {
    let mut interval = tokio::time::interval(limits::IP_STATE_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let mut ip_states = state.ip_states.lock().expect("ip_states mutex poisoned");
        ip_states.sweep(SystemTime::now());
    }
}
