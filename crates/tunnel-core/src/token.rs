//! Claim-code / token credential subsystem.
//!
//! A [`TokenManager`] hands out short-lived, single-use claim codes that an
//! agent redeems for a long-lived bearer token. Expiration is enforced
//! lazily on lookup and by a sweep performed on every insert; there is no
//! background task.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use rand::Rng;
use subtle::ConstantTimeEq;

/// Length of a generated claim code, in characters.
pub const CLAIM_CODE_LEN: usize = 6;
const CLAIM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Bytes of randomness backing a generated token, before hex-encoding.
const TOKEN_ENTROPY_BYTES: usize = 20; // 160 bits, comfortably over the 128-bit floor.

#[derive(Clone, Debug)]
pub struct ClaimCode {
    pub code: String,
    pub agent_id: String,
    pub namespace: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub used: bool,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub token: String,
    pub agent_id: String,
    pub namespace: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub active: bool,
}

pub struct TokenManagerConfig {
    pub code_ttl: Duration,
    pub token_ttl: Duration,
    pub max_tokens_per_agent: usize,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(30 * 60),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            max_tokens_per_agent: 5,
        }
    }
}

/// In-memory claim-code / token store. Not `Clone`; callers share it behind
/// an `Arc<Mutex<..>>` the same way the Bridge shares its agent registry.
pub struct TokenManager {
    config: TokenManagerConfig,
    codes: HashMap<String, ClaimCode>,
    tokens: HashMap<String, Token>,
}

impl TokenManager {
    pub fn new(config: TokenManagerConfig) -> Self {
        Self {
            config,
            codes: HashMap::new(),
            tokens: HashMap::new(),
        }
    }

    /// Generates a fresh one-shot claim code for `agent_id`/`namespace`.
    pub fn generate_claim_code(&mut self, agent_id: &str, namespace: &str) -> ClaimCode {
        self.sweep_expired_codes();

        let now = SystemTime::now();
        let code = random_code();
        let claim = ClaimCode {
            code: code.clone(),
            agent_id: agent_id.to_owned(),
            namespace: namespace.to_owned(),
            created_at: now,
            expires_at: now + self.config.code_ttl,
            used: false,
        };
        self.codes.insert(code, claim.clone());
        claim
    }

    /// Redeems `code`, returning a freshly minted [`Token`] on success.
    ///
    /// A code may be redeemed at most once: unknown, expired, or
    /// already-used codes all yield `None`.
    pub fn redeem_claim_code(&mut self, code: &str) -> Option<Token> {
        let now = SystemTime::now();
        let entry = self.codes.get_mut(code)?;
        if entry.used || entry.expires_at < now {
            return None;
        }
        entry.used = true;
        let (agent_id, namespace) = (entry.agent_id.clone(), entry.namespace.clone());
        Some(self.generate_token(&agent_id, &namespace))
    }

    /// Mints a new bearer token, evicting the agent's oldest active token if
    /// doing so would exceed `max_tokens_per_agent`.
    pub fn generate_token(&mut self, agent_id: &str, namespace: &str) -> Token {
        let now = SystemTime::now();

        let mut active_for_agent: Vec<&str> = self
            .tokens
            .values()
            .filter(|t| t.agent_id == agent_id && t.active && t.expires_at >= now)
            .map(|t| t.token.as_str())
            .collect();

        if active_for_agent.len() >= self.config.max_tokens_per_agent {
            active_for_agent.sort_by_key(|tok| self.tokens[*tok].created_at);
            let oldest = active_for_agent[0].to_owned();
            if let Some(t) = self.tokens.get_mut(&oldest) {
                t.active = false;
            }
        }

        let token_str = random_token();
        let token = Token {
            token: token_str.clone(),
            agent_id: agent_id.to_owned(),
            namespace: namespace.to_owned(),
            created_at: now,
            expires_at: now + self.config.token_ttl,
            active: true,
        };
        self.tokens.insert(token_str, token.clone());
        token
    }

    /// Validates `token`, returning it if present, active, and unexpired.
    pub fn validate_token(&self, token: &str) -> Option<Token> {
        let entry = self.tokens.get(token)?;
        if !entry.active || entry.expires_at < SystemTime::now() {
            return None;
        }
        Some(entry.clone())
    }

    pub fn revoke_token(&mut self, token: &str) -> bool {
        match self.tokens.get_mut(token) {
            Some(t) if t.active => {
                t.active = false;
                true
            }
            _ => false,
        }
    }

    pub fn revoke_all(&mut self, agent_id: &str) -> usize {
        let mut count = 0;
        for t in self.tokens.values_mut() {
            if t.agent_id == agent_id && t.active {
                t.active = false;
                count += 1;
            }
        }
        count
    }

    fn sweep_expired_codes(&mut self) {
        let now = SystemTime::now();
        self.codes.retain(|_, c| c.expires_at >= now);
    }
}

/// Constant-time credential comparison. The length check is an intentional
/// short-circuit: the length of a credential is not itself secret, only its
/// content.
pub fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CLAIM_CODE_LEN)
        .map(|_| CLAIM_CODE_ALPHABET[rng.gen_range(0..CLAIM_CODE_ALPHABET.len())] as char)
        .collect()
}

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_code_redeem_is_single_use() {
        let mut mgr = TokenManager::new(TokenManagerConfig::default());
        let claim = mgr.generate_claim_code("a", "n");
        assert_eq!(claim.code.len(), CLAIM_CODE_LEN);

        let token = mgr.redeem_claim_code(&claim.code).expect("first redeem succeeds");
        assert_eq!(token.agent_id, "a");
        assert_eq!(token.namespace, "n");

        assert!(mgr.redeem_claim_code(&claim.code).is_none());
    }

    #[test]
    fn unknown_code_rejected() {
        let mut mgr = TokenManager::new(TokenManagerConfig::default());
        assert!(mgr.redeem_claim_code("NOPE00").is_none());
    }

    #[test]
    fn expired_code_rejected() {
        let mut mgr = TokenManager::new(TokenManagerConfig {
            code_ttl: Duration::from_secs(0),
            ..TokenManagerConfig::default()
        });
        let claim = mgr.generate_claim_code("a", "n");
        std::thread::sleep(Duration::from_millis(5));
        assert!(mgr.redeem_claim_code(&claim.code).is_none());
    }

    #[test]
    fn token_quota_evicts_oldest() {
        let mut mgr = TokenManager::new(TokenManagerConfig {
            max_tokens_per_agent: 2,
            ..TokenManagerConfig::default()
        });
        let t1 = mgr.generate_token("a", "n");
        std::thread::sleep(Duration::from_millis(5));
        let t2 = mgr.generate_token("a", "n");
        std::thread::sleep(Duration::from_millis(5));
        let t3 = mgr.generate_token("a", "n");

        assert!(mgr.validate_token(&t1.token).is_none(), "oldest token evicted");
        assert!(mgr.validate_token(&t2.token).is_some());
        assert!(mgr.validate_token(&t3.token).is_some());
    }

    #[test]
    fn validate_rejects_revoked() {
        let mut mgr = TokenManager::new(TokenManagerConfig::default());
        let t = mgr.generate_token("a", "n");
        assert!(mgr.revoke_token(&t.token));
        assert!(mgr.validate_token(&t.token).is_none());
        assert!(!mgr.revoke_token(&t.token), "double revoke reports false");
    }

    #[test]
    fn revoke_all_counts_active_only() {
        let mut mgr = TokenManager::new(TokenManagerConfig {
            max_tokens_per_agent: 10,
            ..TokenManagerConfig::default()
        });
        mgr.generate_token("a", "n");
        mgr.generate_token("a", "n");
        mgr.generate_token("b", "n");
        assert_eq!(mgr.revoke_all("a"), 2);
        assert_eq!(mgr.revoke_all("a"), 0);
    }

    #[test]
    fn secure_compare_matches_and_differs() {
        assert!(secure_compare("abc", "abc"));
        assert!(!secure_compare("abc", "abd"));
        assert!(!secure_compare("abc", "abcd"));
    }
}
