//! The agent's persistent control loop: dial the Bridge, authenticate,
//! dispatch `CONNECT` requests to the tunnel handler, and reconnect with a
//! fixed backoff on any loss.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tunnel_core::limits;
use tunnel_core::wire::{self, ControlLine};

use crate::state::AgentState;
use crate::tunnel;

pub async fn run(state: Arc<AgentState>) {
    loop {
        if let Err(e) = run_once(&state).await {
            tracing::warn!(error = %e, "control connection lost");
        }
        tokio::time::sleep(limits::AGENT_RECONNECT_DELAY).await;
    }
}

async fn run_once(state: &Arc<AgentState>) -> anyhow::Result<()> {
    let bridge_addr = format!("{}:{}", state.config.bridge_host, state.config.bridge_port);
    let mut stream = TcpStream::connect(&bridge_addr)
        .await
        .with_context(|| format!("dialing bridge control channel at {bridge_addr}"))?;
    tracing::info!(%bridge_addr, "connected to bridge control channel");

    let credential = state.credential.lock().await.clone();
    let auth_line = wire::auth_line(&credential, state.config.subdomain.as_deref());
    stream.write_all(auth_line.as_bytes()).await?;

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        while let Some(idx) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&line).into_owned();
            handle_control_line(state, &line).await?;
        }

        let n = stream
            .read(&mut chunk)
            .await
            .context("reading from bridge control channel")?;
        if n == 0 {
            anyhow::bail!("control channel closed by bridge");
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > limits::AGENT_CONTROL_LINE_BUFFER {
            anyhow::bail!("control channel line buffer exceeded cap");
        }
    }
}

async fn handle_control_line(state: &Arc<AgentState>, line: &str) -> anyhow::Result<()> {
    match wire::parse_control_line(line) {
        ControlLine::AuthOk {
            assigned_domain,
            token,
        } => {
            tracing::info!(%assigned_domain, "authenticated with bridge");
            if let Some(token) = token {
                *state.credential.lock().await = token;
            }
            Ok(())
        }
        ControlLine::AuthFail(reason) => {
            anyhow::bail!("authentication failed: {reason}");
        }
        ControlLine::Connect { conn_id } => {
            spawn_tunnel(state.clone(), conn_id);
            Ok(())
        }
        ControlLine::Other => Ok(()),
    }
}

fn spawn_tunnel(state: Arc<AgentState>, conn_id: String) {
    let permit = match state.active_connections.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::debug!(%conn_id, "at MAX_CONCURRENT_CONNECTIONS, dropping CONNECT");
            return;
        }
    };
    tokio::spawn(async move {
        tunnel::run(state, conn_id, permit).await;
    });
}
