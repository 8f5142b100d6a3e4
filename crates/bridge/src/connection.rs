//! Per-connection protocol discrimination and the three downstream
//! handlers (PLAYER, AGENT_CONTROL, AGENT_DATA). One task per accepted
//! socket, matching the accept-loop-per-task pattern this corpus uses for
//! its own listener (`valence_network::connect::do_accept_loop`).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tunnel_core::discriminate::{self, AgentCommandKind, Discrimination};
use tunnel_core::ip_state::ConnectDecision;
use tunnel_core::limits;
use tunnel_core::wire::{self, AuthReply};
use uuid::Uuid;

use crate::auth;
use crate::state::{BridgeState, PendingSlot, PlayerHandoff};

pub async fn handle_connection(state: Arc<BridgeState>, mut stream: TcpStream, peer_addr: SocketAddr) {
    let ip = peer_addr.ip();

    let decision = {
        let mut ip_states = state.ip_states.lock().expect("ip_states mutex poisoned");
        ip_states.record_connection(ip, SystemTime::now())
    };
    if decision == ConnectDecision::RateLimited {
        state.metrics.connection_rejected_rate_limited();
        tracing::debug!(%ip, "connection rejected: per-IP rate limit exceeded");
        return;
    }
    state.metrics.connection_accepted();

    let mut buf = Vec::new();
    let deadline = Instant::now() + limits::HANDSHAKE_TIMEOUT;
    let mut chunk = [0u8; 4096];

    loop {
        match discriminate::classify(&buf) {
            Discrimination::NeedMoreData => {}
            Discrimination::Player { player_offset } => {
                let initial = buf[player_offset..].to_vec();
                return handle_player(state, stream, ip, initial).await;
            }
            Discrimination::AgentCommand {
                kind,
                offset,
                line_end,
            } => {
                let line = buf[offset..line_end].to_vec();
                let payload = buf[line_end..].to_vec();
                return match kind {
                    AgentCommandKind::Auth => handle_agent_auth(state, stream, ip, &line, payload).await,
                    AgentCommandKind::Data => handle_agent_data(state, stream, &line, payload).await,
                };
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(%ip, "handshake timeout while still UNKNOWN");
            return;
        }

        let n = match tokio::time::timeout(remaining, stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return,
            Ok(Ok(n)) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > limits::MAX_BUFFER_SIZE {
            tracing::debug!(%ip, "discrimination buffer cap exceeded");
            return;
        }
    }
}

async fn handle_player(state: Arc<BridgeState>, mut stream: TcpStream, ip: IpAddr, initial: Vec<u8>) {
    let target_agent_id = tunnel_core::handshake::decode(&initial)
        .ok()
        .and_then(|hs| {
            tunnel_core::handshake::routing_label(&hs.server_address, state.config.domain.as_deref())
                .map(str::to_owned)
        });

    let agent_id = {
        let agents = state.agents.lock().await;
        match target_agent_id {
            Some(id) if agents.contains(&id) => Some(id),
            _ if agents.contains("default") => Some("default".to_owned()),
            _ if state.config.lenient_routing_fallback => agents.any_id().map(str::to_owned),
            _ => None,
        }
    };

    let Some(agent_id) = agent_id else {
        state.metrics.player_dropped_no_agent();
        tracing::debug!(%ip, "no agent to route player to");
        return;
    };

    let conn_id = Uuid::new_v4().to_string();
    let (claim_tx, mut claim_rx) = oneshot::channel();

    {
        let mut pending = state.pending_players.lock().await;
        if !pending.try_insert(conn_id.clone(), PendingSlot { claim_tx }) {
            tracing::debug!(%ip, "pending-players table full");
            return;
        }
        state.metrics.pending_players_gauge(pending.len());
    }

    {
        let agents = state.agents.lock().await;
        let Some(handle) = agents.get(&agent_id) else {
            state.pending_players.lock().await.remove(&conn_id);
            return;
        };
        if handle.send(wire::connect_line(&conn_id)).is_err() {
            drop(agents);
            state.pending_players.lock().await.remove(&conn_id);
            return;
        }
    }
    state.metrics.player_routed();

    let mut buffered = initial;
    let sleep = tokio::time::sleep(limits::PENDING_TIMEOUT);
    tokio::pin!(sleep);
    let mut read_buf = [0u8; 4096];

    loop {
        tokio::select! {
            reply = &mut claim_rx => {
                if let Ok(reply_tx) = reply {
                    let _ = reply_tx.send(PlayerHandoff { stream, buffered });
                }
                return;
            }
            () = &mut sleep => {
                let removed = state.pending_players.lock().await.remove(&conn_id).is_some();
                if removed {
                    tracing::debug!(conn_id, "pending timeout: player never claimed");
                    return;
                }
                // Lost the race to a concurrent DATA claim; honor it instead of
                // closing a connection that's about to be paired.
                if let Ok(reply_tx) = (&mut claim_rx).await {
                    let _ = reply_tx.send(PlayerHandoff { stream, buffered });
                }
                return;
            }
            result = stream.read(&mut read_buf) => {
                match result {
                    Ok(0) | Err(_) => {
                        state.pending_players.lock().await.remove(&conn_id);
                        return;
                    }
                    Ok(n) => {
                        buffered.extend_from_slice(&read_buf[..n]);
                        if buffered.len() > limits::MAX_PLAYER_WAIT_BUFFER {
                            tracing::debug!(conn_id, "player wait-buffer cap exceeded");
                            state.pending_players.lock().await.remove(&conn_id);
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn handle_agent_auth(
    state: Arc<BridgeState>,
    mut stream: TcpStream,
    ip: IpAddr,
    line: &[u8],
    _coalesced: Vec<u8>,
) {
    let locked = {
        let ip_states = state.ip_states.lock().expect("ip_states mutex poisoned");
        ip_states.is_locked_out(ip, SystemTime::now())
    };
    if locked {
        let _ = stream.write_all(AuthReply::FailLocked.render().as_bytes()).await;
        return;
    }

    let Some(cmd) = wire::parse_auth(line) else {
        let _ = stream
            .write_all(AuthReply::FailInvalidFormat.render().as_bytes())
            .await;
        return;
    };

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    match auth::authenticate(&state, ip, &cmd.credential, cmd.subdomain.as_deref(), tx).await {
        Ok(success) => {
            let reply = AuthReply::Ok {
                assigned_domain: success.assigned_domain.clone(),
                token: success.token.clone(),
            };
            if stream.write_all(reply.render().as_bytes()).await.is_err() {
                state.agents.lock().await.unregister(&success.agent_id);
                return;
            }
            let connected = state.agents.lock().await.len();
            state.metrics.agents_connected_gauge(connected);
            tracing::info!(agent_id = %success.agent_id, "agent authenticated");
            run_agent_control(state, stream, success.agent_id, rx).await;
        }
        Err(reply) => {
            let _ = stream.write_all(reply.render().as_bytes()).await;
        }
    }
}

async fn run_agent_control(
    state: Arc<BridgeState>,
    stream: TcpStream,
    agent_id: String,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut read_half, mut write_half) = stream.into_split();

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut scratch = [0u8; 1024];
    loop {
        match read_half.read(&mut scratch).await {
            Ok(0) | Err(_) => break,
            Ok(_) => continue,
        }
    }

    writer.abort();
    state.agents.lock().await.unregister(&agent_id);
    let connected = state.agents.lock().await.len();
    state.metrics.agents_connected_gauge(connected);
    tracing::info!(agent_id, "agent control channel closed");
}

async fn handle_agent_data(state: Arc<BridgeState>, mut stream: TcpStream, line: &[u8], coalesced: Vec<u8>) {
    let Some(cmd) = wire::parse_data(line) else {
        return;
    };

    let slot = state.pending_players.lock().await.remove(&cmd.conn_id);
    let Some(slot) = slot else {
        tracing::debug!(conn_id = %cmd.conn_id, "DATA for unknown conn_id");
        return;
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if slot.claim_tx.send(reply_tx).is_err() {
        return;
    }

    let handoff = match reply_rx.await {
        Ok(h) => h,
        Err(_) => return,
    };

    let PlayerHandoff {
        stream: mut player_stream,
        buffered,
    } = handoff;

    if !coalesced.is_empty() && player_stream.write_all(&coalesced).await.is_err() {
        return;
    }
    if !buffered.is_empty() && stream.write_all(&buffered).await.is_err() {
        return;
    }

    match tokio::io::copy_bidirectional(&mut player_stream, &mut stream).await {
        Ok((to_agent, to_player)) => {
            state
                .metrics
                .bytes_forwarded(tunnel_core::metrics::Direction::PlayerToAgent, to_agent);
            state
                .metrics
                .bytes_forwarded(tunnel_core::metrics::Direction::AgentToPlayer, to_player);
        }
        Err(e) => tracing::debug!(conn_id = %cmd.conn_id, error = %e, "splice ended"),
    }
}
