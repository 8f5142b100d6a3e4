//! Per-IP abuse bookkeeping: connection-rate limiting and auth-failure
//! lockout. A single `IpStateTable` is shared (behind a `std::sync::Mutex`,
//! this bookkeeping is synchronous and cheap enough not to warrant an async
//! lock) across the Bridge's accept loop.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

#[derive(Clone, Copy, Debug)]
pub struct IpStateConfig {
    pub max_conn_per_ip_sec: u32,
    pub max_auth_attempts: u32,
    pub auth_lockout: Duration,
    pub sweep_idle_after: Duration,
}

impl Default for IpStateConfig {
    fn default() -> Self {
        Self {
            max_conn_per_ip_sec: 20,
            max_auth_attempts: 5,
            auth_lockout: Duration::from_secs(60),
            sweep_idle_after: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug)]
struct IpState {
    auth_failures: u32,
    lockout_until: Option<SystemTime>,
    connections_this_second: u32,
    current_second_start: SystemTime,
    last_activity: SystemTime,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConnectDecision {
    Allow,
    RateLimited,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AuthFailureOutcome {
    Recorded,
    LockedOut,
}

pub struct IpStateTable {
    config: IpStateConfig,
    states: HashMap<IpAddr, IpState>,
}

impl IpStateTable {
    pub fn new(config: IpStateConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Records a new accepted connection attempt from `ip` at `now`,
    /// returning whether it should be allowed to proceed.
    pub fn record_connection(&mut self, ip: IpAddr, now: SystemTime) -> ConnectDecision {
        let entry = self.states.entry(ip).or_insert_with(|| IpState {
            auth_failures: 0,
            lockout_until: None,
            connections_this_second: 0,
            current_second_start: now,
            last_activity: now,
        });
        entry.last_activity = now;

        let within_same_second = now
            .duration_since(entry.current_second_start)
            .map(|d| d < Duration::from_secs(1))
            .unwrap_or(true);

        if within_same_second {
            entry.connections_this_second += 1;
        } else {
            entry.connections_this_second = 1;
            entry.current_second_start = now;
        }

        if entry.connections_this_second > self.config.max_conn_per_ip_sec {
            ConnectDecision::RateLimited
        } else {
            ConnectDecision::Allow
        }
    }

    /// Whether `ip` is currently under an auth-failure lockout.
    pub fn is_locked_out(&self, ip: IpAddr, now: SystemTime) -> bool {
        self.states
            .get(&ip)
            .and_then(|s| s.lockout_until)
            .map(|until| until > now)
            .unwrap_or(false)
    }

    /// Records a failed authentication attempt, arming a lockout once
    /// `max_auth_attempts` is reached.
    pub fn record_auth_failure(&mut self, ip: IpAddr, now: SystemTime) -> AuthFailureOutcome {
        let entry = self.states.entry(ip).or_insert_with(|| IpState {
            auth_failures: 0,
            lockout_until: None,
            connections_this_second: 0,
            current_second_start: now,
            last_activity: now,
        });
        entry.last_activity = now;
        entry.auth_failures += 1;

        if entry.auth_failures >= self.config.max_auth_attempts {
            entry.lockout_until = Some(now + self.config.auth_lockout);
            AuthFailureOutcome::LockedOut
        } else {
            AuthFailureOutcome::Recorded
        }
    }

    /// Resets the failure counter for `ip` after a successful authentication.
    pub fn record_auth_success(&mut self, ip: IpAddr, now: SystemTime) {
        if let Some(entry) = self.states.get_mut(&ip) {
            entry.auth_failures = 0;
            entry.lockout_until = None;
            entry.last_activity = now;
        }
    }

    /// Removes entries whose lockout has elapsed and which have been idle
    /// past `sweep_idle_after`. Intended to be called on a periodic tick
    /// (every 60s per spec), not a background thread owned by this table.
    pub fn sweep(&mut self, now: SystemTime) {
        self.states.retain(|_, s| {
            let lockout_active = s.lockout_until.map(|until| until > now).unwrap_or(false);
            let idle = now
                .duration_since(s.last_activity)
                .map(|d| d > self.config.sweep_idle_after)
                .unwrap_or(false);
            lockout_active || !idle
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_trips_after_threshold() {
        let mut table = IpStateTable::new(IpStateConfig {
            max_conn_per_ip_sec: 2,
            ..IpStateConfig::default()
        });
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let now = SystemTime::now();

        assert_eq!(table.record_connection(ip, now), ConnectDecision::Allow);
        assert_eq!(table.record_connection(ip, now), ConnectDecision::Allow);
        assert_eq!(table.record_connection(ip, now), ConnectDecision::RateLimited);

        let later = now + Duration::from_secs(2);
        assert_eq!(table.record_connection(ip, later), ConnectDecision::Allow);
    }

    #[test]
    fn lockout_after_max_auth_attempts() {
        let mut table = IpStateTable::new(IpStateConfig {
            max_auth_attempts: 5,
            ..IpStateConfig::default()
        });
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let now = SystemTime::now();

        for _ in 0..4 {
            assert_eq!(
                table.record_auth_failure(ip, now),
                AuthFailureOutcome::Recorded
            );
        }
        assert_eq!(
            table.record_auth_failure(ip, now),
            AuthFailureOutcome::LockedOut
        );
        assert!(table.is_locked_out(ip, now));

        let after_lockout = now + Duration::from_secs(61);
        assert!(!table.is_locked_out(ip, after_lockout));
    }

    #[test]
    fn successful_auth_resets_failures() {
        let mut table = IpStateTable::new(IpStateConfig::default());
        let ip: IpAddr = "10.0.0.2".parse().unwrap();
        let now = SystemTime::now();

        table.record_auth_failure(ip, now);
        table.record_auth_failure(ip, now);
        table.record_auth_success(ip, now);

        for _ in 0..4 {
            table.record_auth_failure(ip, now);
        }
        assert!(!table.is_locked_out(ip, now), "counter was reset, shouldn't lock out yet");
    }

    #[test]
    fn sweep_removes_idle_expired_entries() {
        let mut table = IpStateTable::new(IpStateConfig {
            sweep_idle_after: Duration::from_secs(10),
            ..IpStateConfig::default()
        });
        let ip: IpAddr = "10.0.0.3".parse().unwrap();
        let now = SystemTime::now();
        table.record_connection(ip, now);

        table.sweep(now + Duration::from_secs(1));
        assert_eq!(table.len(), 1, "still within idle window");

        table.sweep(now + Duration::from_secs(20));
        assert_eq!(table.len(), 0, "idle past threshold and not locked out");
    }
}
