//! Shared numeric limits named throughout the spec. Collected here so the
//! Bridge and Agent binaries reference one definition each instead of
//! re-declaring magic numbers.

use std::time::Duration;

/// Cap on the `UNKNOWN`-state discrimination buffer.
pub const MAX_BUFFER_SIZE: usize = 4096;

/// Cap on a PLAYER connection's outbound buffer while it waits to be paired
/// with an AGENT_DATA peer. Closes the latent unbounded-growth bug noted in
/// the design notes.
pub const MAX_PLAYER_WAIT_BUFFER: usize = 64 * 1024;

/// Cap on the Agent's local-service buffer while it waits for its data
/// channel to the Bridge to come up.
pub const MAX_PENDING_BUFFER_SIZE: usize = 1024 * 1024;

/// Cap on the Agent's line-buffered control-channel read buffer.
pub const AGENT_CONTROL_LINE_BUFFER: usize = 16 * 1024;

/// Maximum number of concurrent player tunnels a single Agent will service.
pub const MAX_CONCURRENT_CONNECTIONS: usize = 50;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const PENDING_TIMEOUT: Duration = Duration::from_secs(10);
pub const AGENT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const IP_STATE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
