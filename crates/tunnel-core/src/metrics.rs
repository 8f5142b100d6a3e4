//! Narrow metrics-registry interface. The core only calls this trait; it
//! never owns a concrete exporter. Binaries that need a real backend (e.g.
//! Prometheus) provide their own implementation; this crate ships only a
//! no-op (for tests) and a tracing-backed fallback for operators without
//! one.

/// A named counter/gauge registry the core reports observations to.
///
/// Every method has a default no-op body so new observation points can be
/// added to the trait without breaking existing implementors.
pub trait Metrics: Send + Sync {
    fn connection_accepted(&self) {}
    fn connection_rejected_rate_limited(&self) {}
    fn auth_failure(&self) {}
    fn auth_lockout(&self) {}
    fn player_routed(&self) {}
    fn player_dropped_no_agent(&self) {}
    fn pending_players_gauge(&self, _value: usize) {}
    fn agents_connected_gauge(&self, _value: usize) {}
    fn bytes_forwarded(&self, _direction: Direction, _count: u64) {}
    fn token_issued(&self) {}
    fn claim_code_redeemed(&self) {}
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Direction {
    PlayerToAgent,
    AgentToPlayer,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::PlayerToAgent => "player_to_agent",
            Direction::AgentToPlayer => "agent_to_player",
        }
    }
}

/// Discards every observation. The default for unit and integration tests.
#[derive(Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {}

/// Logs each observation at debug level through `tracing`, for operators
/// running without a dedicated metrics backend.
#[derive(Default)]
pub struct TracingMetrics;

impl Metrics for TracingMetrics {
    fn connection_accepted(&self) {
        tracing::debug!(metric = "connections_accepted_total");
    }

    fn connection_rejected_rate_limited(&self) {
        tracing::debug!(metric = "connections_rejected_rate_limited_total");
    }

    fn auth_failure(&self) {
        tracing::debug!(metric = "auth_failures_total");
    }

    fn auth_lockout(&self) {
        tracing::debug!(metric = "auth_lockouts_total");
    }

    fn player_routed(&self) {
        tracing::debug!(metric = "players_routed_total");
    }

    fn player_dropped_no_agent(&self) {
        tracing::debug!(metric = "players_dropped_no_agent_total");
    }

    fn pending_players_gauge(&self, value: usize) {
        tracing::debug!(metric = "pending_players_current", value);
    }

    fn agents_connected_gauge(&self, value: usize) {
        tracing::debug!(metric = "agents_connected_current", value);
    }

    fn bytes_forwarded(&self, direction: Direction, count: u64) {
        tracing::debug!(metric = "bytes_forwarded_total", direction = direction.as_str(), count);
    }

    fn token_issued(&self) {
        tracing::debug!(metric = "tokens_issued_total");
    }

    fn claim_code_redeemed(&self) {
        tracing::debug!(metric = "claim_codes_redeemed_total");
    }
}
