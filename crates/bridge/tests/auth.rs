//! Authentication-path tests exercising `bridge::auth::authenticate`
//! directly against a real `BridgeState`, independent of socket I/O.

use std::net::IpAddr;
use std::sync::Arc;

use bridge::auth::authenticate;
use bridge::config::{AuthConfig, BridgeConfig};
use bridge::state::{AgentHandle, BridgeState};
use tokio::sync::mpsc;
use tunnel_core::metrics::NoopMetrics;
use tunnel_core::wire::AuthReply;

fn ip() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

fn handle() -> AgentHandle {
    mpsc::unbounded_channel().0
}

#[tokio::test]
async fn shared_secret_mode_rejects_wrong_credential() {
    let state = BridgeState::new(
        BridgeConfig {
            secret: "hunter2".to_owned(),
            ..BridgeConfig::default()
        },
        Arc::new(NoopMetrics),
    );
    let err = authenticate(&state, ip(), "wrong", None, handle()).await.unwrap_err();
    assert_eq!(err, AuthReply::Fail);
}

#[tokio::test]
async fn shared_secret_mode_rejects_duplicate_subdomain() {
    let state = BridgeState::new(
        BridgeConfig {
            secret: "hunter2".to_owned(),
            ..BridgeConfig::default()
        },
        Arc::new(NoopMetrics),
    );
    authenticate(&state, ip(), "hunter2", Some("alpha"), handle())
        .await
        .expect("first registration succeeds");
    let err = authenticate(&state, ip(), "hunter2", Some("alpha"), handle())
        .await
        .unwrap_err();
    assert_eq!(err, AuthReply::FailInUse);
}

#[tokio::test]
async fn token_mode_redeems_claim_code_then_accepts_the_issued_token() {
    let state = BridgeState::new(
        BridgeConfig {
            auth: AuthConfig {
                enabled: true,
                ..AuthConfig::default()
            },
            ..BridgeConfig::default()
        },
        Arc::new(NoopMetrics),
    );
    let claim = state.tokens.lock().await.generate_claim_code("agent-1", "tenants.example.com");

    let success = authenticate(&state, ip(), &claim.code, None, handle())
        .await
        .expect("claim code redemption succeeds");
    assert_eq!(success.agent_id, "agent-1");
    let token = success.token.clone().expect("first auth mints a token");

    // The same code cannot be redeemed twice.
    let err = authenticate(&state, ip(), &claim.code, None, handle())
        .await
        .unwrap_err();
    assert_eq!(err, AuthReply::FailInvalidCredentials);

    // The issued token itself authenticates, once the prior registration unregisters.
    state.agents.lock().await.unregister("agent-1");
    let success = authenticate(&state, ip(), &token, None, handle())
        .await
        .expect("issued token authenticates");
    assert_eq!(success.agent_id, "agent-1");
    assert!(success.token.is_none(), "re-authenticating with a token mints no new token");
}

#[tokio::test]
async fn token_mode_rejects_unknown_credential() {
    let state = BridgeState::new(
        BridgeConfig {
            auth: AuthConfig {
                enabled: true,
                ..AuthConfig::default()
            },
            ..BridgeConfig::default()
        },
        Arc::new(NoopMetrics),
    );
    let err = authenticate(&state, ip(), "NOPE00", None, handle()).await.unwrap_err();
    assert_eq!(err, AuthReply::FailInvalidCredentials);
}
