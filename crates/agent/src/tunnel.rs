//! Per-`CONNECT` tunnel: dial the local service, dial a fresh Bridge data
//! channel, and splice the two until either side closes.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tunnel_core::limits;
use tunnel_core::metrics::Direction;
use tunnel_core::wire;

use crate::state::AgentState;

pub async fn run(state: Arc<AgentState>, conn_id: String, _permit: OwnedSemaphorePermit) {
    let local_addr = format!("{}:{}", state.config.local_host, state.config.local_port);
    let mut local_stream = match TcpStream::connect(&local_addr).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to dial local service");
            return;
        }
    };

    let bridge_addr = format!("{}:{}", state.config.bridge_host, state.config.bridge_port);

    // Buffer local-side bytes while the data channel is still being dialled;
    // the local service may start writing (e.g. a status response) before
    // the Bridge rendezvous completes.
    let mut local_buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let dial_fut = TcpStream::connect(&bridge_addr);
    tokio::pin!(dial_fut);

    let mut data_stream = loop {
        tokio::select! {
            dial_result = &mut dial_fut => {
                match dial_result {
                    Ok(s) => break s,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to dial bridge data channel");
                        return;
                    }
                }
            }
            result = local_stream.read(&mut chunk) => {
                match result {
                    Ok(0) | Err(_) => {
                        tracing::debug!(%conn_id, "local service closed before rendezvous completed");
                        return;
                    }
                    Ok(n) => {
                        local_buf.extend_from_slice(&chunk[..n]);
                        if local_buf.len() > limits::MAX_PENDING_BUFFER_SIZE {
                            tracing::debug!(%conn_id, "local-side pending buffer cap exceeded");
                            return;
                        }
                    }
                }
            }
        }
    };

    let header = wire::data_line(&conn_id);
    if data_stream.write_all(header.as_bytes()).await.is_err() {
        return;
    }
    if !local_buf.is_empty() && data_stream.write_all(&local_buf).await.is_err() {
        return;
    }

    match tokio::io::copy_bidirectional(&mut local_stream, &mut data_stream).await {
        Ok((local_to_data, data_to_local)) => {
            state.metrics.bytes_forwarded(Direction::PlayerToAgent, local_to_data);
            state.metrics.bytes_forwarded(Direction::AgentToPlayer, data_to_local);
            tracing::debug!(%conn_id, local_to_data, data_to_local, "tunnel closed");
        }
        Err(e) => tracing::debug!(%conn_id, error = %e, "tunnel splice ended"),
    }
}

