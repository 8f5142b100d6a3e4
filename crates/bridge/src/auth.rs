//! Bridge-side authentication: shared-secret mode and claim-code/token
//! mode, selected once at startup by `BridgeConfig.auth.enabled`.

use std::net::IpAddr;
use std::time::SystemTime;

use rand::Rng;
use tunnel_core::ip_state::AuthFailureOutcome;
use tunnel_core::token::secure_compare;
use tunnel_core::wire::AuthReply;

use crate::state::{AgentHandle, BridgeState};

pub struct AuthSuccess {
    pub agent_id: String,
    pub assigned_domain: String,
    pub token: Option<String>,
}

/// Attempts to authenticate and, on success, registers the agent under the
/// returned id using `handle`. On failure `handle` is dropped untouched.
pub async fn authenticate(
    state: &BridgeState,
    ip: IpAddr,
    credential: &str,
    subdomain: Option<&str>,
    handle: AgentHandle,
) -> Result<AuthSuccess, AuthReply> {
    if state.config.auth.enabled {
        authenticate_token_mode(state, ip, credential, handle).await
    } else {
        authenticate_shared_secret_mode(state, ip, credential, subdomain, handle).await
    }
}

async fn authenticate_shared_secret_mode(
    state: &BridgeState,
    ip: IpAddr,
    credential: &str,
    subdomain: Option<&str>,
    handle: AgentHandle,
) -> Result<AuthSuccess, AuthReply> {
    if !secure_compare(credential, &state.config.secret) {
        record_failure(state, ip);
        return Err(AuthReply::Fail);
    }

    let agent_id = subdomain.map(str::to_owned).unwrap_or_else(random_id);

    let mut agents = state.agents.lock().await;
    if !agents.register(agent_id.clone(), handle) {
        return Err(AuthReply::FailInUse);
    }
    drop(agents);

    record_success(state, ip);
    Ok(AuthSuccess {
        assigned_domain: format!("{agent_id}.bridge"),
        agent_id,
        token: None,
    })
}

async fn authenticate_token_mode(
    state: &BridgeState,
    ip: IpAddr,
    credential: &str,
    handle: AgentHandle,
) -> Result<AuthSuccess, AuthReply> {
    let existing_token = { state.tokens.lock().await.validate_token(credential) };
    if let Some(token) = existing_token {
        return bind_agent(state, ip, token.agent_id, token.namespace, None, handle).await;
    }

    let redeemed = { state.tokens.lock().await.redeem_claim_code(credential) };
    if let Some(token) = redeemed {
        state.metrics.claim_code_redeemed();
        state.metrics.token_issued();
        return bind_agent(
            state,
            ip,
            token.agent_id,
            token.namespace,
            Some(token.token),
            handle,
        )
        .await;
    }

    record_failure(state, ip);
    Err(AuthReply::FailInvalidCredentials)
}

async fn bind_agent(
    state: &BridgeState,
    ip: IpAddr,
    agent_id: String,
    namespace: String,
    token: Option<String>,
    handle: AgentHandle,
) -> Result<AuthSuccess, AuthReply> {
    let mut agents = state.agents.lock().await;
    if agents.contains(&agent_id) {
        return Err(AuthReply::FailAgentAlreadyConnected);
    }
    agents.register(agent_id.clone(), handle);
    drop(agents);

    record_success(state, ip);
    Ok(AuthSuccess {
        assigned_domain: format!("{agent_id}.{namespace}"),
        agent_id,
        token,
    })
}

fn record_failure(state: &BridgeState, ip: IpAddr) {
    let mut ip_states = state.ip_states.lock().expect("ip_states mutex poisoned");
    if ip_states.record_auth_failure(ip, SystemTime::now()) == AuthFailureOutcome::LockedOut {
        state.metrics.auth_lockout();
    }
    state.metrics.auth_failure();
}

fn record_success(state: &BridgeState, ip: IpAddr) {
    let mut ip_states = state.ip_states.lock().expect("ip_states mutex poisoned");
    ip_states.record_auth_success(ip, SystemTime::now());
}

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

