//! Agent registry and pending-player table.
//!
//! Both are plain keyed maps; the networking layer (the `bridge` binary)
//! owns the actual socket handles and is responsible for locking (a single
//! `tokio::sync::Mutex` per table, matching the `SharedNetworkState` pattern
//! this corpus uses for its own shared registries).

use std::collections::HashMap;

/// Maps `agent_id -> H` where `H` is whatever the caller uses to reach an
/// authenticated AGENT_CONTROL connection (e.g. a writer half plus a
/// cancellation handle). Keys are unique: registering an id already in use
/// fails rather than overwriting.
pub struct AgentRegistry<H> {
    agents: HashMap<String, H>,
}

impl<H> Default for AgentRegistry<H> {
    fn default() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }
}

impl<H> AgentRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `agent_id -> handle`. Returns `false` without mutating the
    /// registry if `agent_id` is already registered.
    pub fn register(&mut self, agent_id: impl Into<String>, handle: H) -> bool {
        let agent_id = agent_id.into();
        if self.agents.contains_key(&agent_id) {
            return false;
        }
        self.agents.insert(agent_id, handle);
        true
    }

    pub fn unregister(&mut self, agent_id: &str) -> Option<H> {
        self.agents.remove(agent_id)
    }

    pub fn get(&self, agent_id: &str) -> Option<&H> {
        self.agents.get(agent_id)
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns an arbitrary registered id, used only by the
    /// `lenient_routing_fallback` escape hatch (default off).
    pub fn any_id(&self) -> Option<&str> {
        self.agents.keys().next().map(String::as_str)
    }
}

/// Cap on simultaneous rendezvous-in-flight players.
pub const MAX_PENDING_PLAYERS: usize = 1000;

/// Maps `conn_id -> H`, populated when the Bridge emits `CONNECT <id>` to an
/// agent and drained on the matching `DATA <id>` (or on pending-timeout).
pub struct PendingPlayers<H> {
    pending: HashMap<String, H>,
    cap: usize,
}

impl<H> Default for PendingPlayers<H> {
    fn default() -> Self {
        Self::new(MAX_PENDING_PLAYERS)
    }
}

impl<H> PendingPlayers<H> {
    pub fn new(cap: usize) -> Self {
        Self {
            pending: HashMap::new(),
            cap,
        }
    }

    /// Inserts `conn_id -> handle` unless the table is already at capacity.
    /// Returns `false` (without mutating) when the cap would be exceeded.
    pub fn try_insert(&mut self, conn_id: impl Into<String>, handle: H) -> bool {
        if self.pending.len() >= self.cap {
            return false;
        }
        self.pending.insert(conn_id.into(), handle);
        true
    }

    pub fn remove(&mut self, conn_id: &str) -> Option<H> {
        self.pending.remove(conn_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_registration_rejects_duplicate_id() {
        let mut reg: AgentRegistry<u32> = AgentRegistry::new();
        assert!(reg.register("alpha", 1));
        assert!(!reg.register("alpha", 2));
        assert_eq!(reg.get("alpha"), Some(&1));
    }

    #[test]
    fn pending_players_respects_cap() {
        let mut pending: PendingPlayers<u32> = PendingPlayers::new(2);
        assert!(pending.try_insert("a", 1));
        assert!(pending.try_insert("b", 2));
        assert!(!pending.try_insert("c", 3));
        assert_eq!(pending.len(), 2);

        pending.remove("a");
        assert!(pending.try_insert("c", 3));
    }
}
