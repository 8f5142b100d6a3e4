//! Exercises `agent::tunnel::run` against real loopback sockets standing in
//! for the local service and the Bridge data channel.

use std::sync::Arc;

use agent::config::AgentConfig;
use agent::state::AgentState;
use agent::tunnel::run;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tunnel_core::metrics::NoopMetrics;

#[tokio::test]
async fn buffers_local_bytes_while_dialing_then_splices_both_ways() {
    let local_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = local_listener.local_addr().unwrap();
    let bridge_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge_addr = bridge_listener.local_addr().unwrap();

    // The local service accepts and immediately writes a greeting, before
    // the agent has even dialled the bridge data channel.
    let local_task = tokio::spawn(async move {
        let (mut sock, _) = local_listener.accept().await.unwrap();
        sock.write_all(b"local-greeting").await.unwrap();
        sock
    });

    let config = AgentConfig {
        local_host: local_addr.ip().to_string(),
        local_port: local_addr.port(),
        bridge_host: bridge_addr.ip().to_string(),
        bridge_port: bridge_addr.port(),
        ..AgentConfig::default()
    };
    let state = AgentState::new(config, Arc::new(NoopMetrics));
    let semaphore = Arc::new(Semaphore::new(1));
    let permit = semaphore.try_acquire_owned().unwrap();

    let run_task = tokio::spawn(run(state, "conn-1".to_owned(), permit));

    let (mut data_sock, _) = bridge_listener.accept().await.unwrap();

    let mut header = [0u8; b"DATA conn-1\n".len()];
    data_sock.read_exact(&mut header).await.unwrap();
    assert_eq!(&header, b"DATA conn-1\n");

    let mut greeting = [0u8; b"local-greeting".len()];
    data_sock.read_exact(&mut greeting).await.unwrap();
    assert_eq!(&greeting, b"local-greeting");

    data_sock.write_all(b"from-bridge").await.unwrap();
    let mut local_sock = local_task.await.unwrap();
    let mut buf = [0u8; b"from-bridge".len()];
    local_sock.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"from-bridge");

    drop(data_sock);
    drop(local_sock);
    let _ = run_task.await;
}
