//! Shared, process-wide Bridge state: the agent registry, the
//! pending-player table, per-IP bookkeeping, and the credential manager.
//! Mirrors the `SharedNetworkState(Arc<Inner>)` newtype pattern this corpus
//! uses for its own shared registries.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tunnel_core::ip_state::{IpStateConfig, IpStateTable};
use tunnel_core::registry::{AgentRegistry, PendingPlayers};
use tunnel_core::token::{TokenManager, TokenManagerConfig};
use tunnel_core::Metrics;

use crate::config::BridgeConfig;

/// Channel an AGENT_CONTROL connection's writer task drains to push text
/// lines (`CONNECT <id>\n`) out over the wire. The control task owns the
/// actual socket; everyone else only reaches it through this handle.
pub type AgentHandle = mpsc::UnboundedSender<String>;

/// What a claiming AGENT_DATA task sends back through a pending player's
/// handoff channel once it has taken the slot: ownership of the player's
/// own socket, plus whatever it had buffered while waiting to be paired.
pub struct PlayerHandoff {
    pub stream: tokio::net::TcpStream,
    pub buffered: Vec<u8>,
}

/// The two-step rendezvous: a player parks a [`oneshot::Sender`] that hands
/// it a place to deliver its socket once claimed, so a racing pending-
/// timeout and a racing `DATA` arrival can never both win.
pub struct PendingSlot {
    pub claim_tx: oneshot::Sender<oneshot::Sender<PlayerHandoff>>,
}

pub struct BridgeState {
    pub config: BridgeConfig,
    pub agents: AsyncMutex<AgentRegistry<AgentHandle>>,
    pub pending_players: AsyncMutex<PendingPlayers<PendingSlot>>,
    pub ip_states: StdMutex<IpStateTable>,
    pub tokens: AsyncMutex<TokenManager>,
    pub metrics: Arc<dyn Metrics>,
}

impl BridgeState {
    pub fn new(config: BridgeConfig, metrics: Arc<dyn Metrics>) -> Arc<Self> {
        let token_config = TokenManagerConfig {
            code_ttl: std::time::Duration::from_secs(u64::from(config.auth.code_expiry_minutes) * 60),
            token_ttl: std::time::Duration::from_secs(u64::from(config.auth.token_expiry_hours) * 3600),
            max_tokens_per_agent: config.auth.max_tokens_per_agent as usize,
        };

        Arc::new(Self {
            config,
            agents: AsyncMutex::new(AgentRegistry::new()),
            pending_players: AsyncMutex::new(PendingPlayers::default()),
            ip_states: StdMutex::new(IpStateTable::new(IpStateConfig::default())),
            tokens: AsyncMutex::new(TokenManager::new(token_config)),
            metrics,
        })
    }
}
