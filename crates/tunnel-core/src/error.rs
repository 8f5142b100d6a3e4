//! Crate-local error types for the tunnel core.
//!
//! Binaries surface failures through `anyhow::Result`; this crate exposes a
//! `thiserror`-derived enum at its own boundary so callers can match on a
//! specific variant without downcasting an opaque `anyhow::Error`.

use thiserror::Error;

use crate::handshake::HandshakeDecodeError;
use crate::varint::VarIntDecodeError;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("malformed handshake packet: {0}")]
    Protocol(#[from] HandshakeDecodeError),

    #[error("malformed VarInt: {0}")]
    VarInt(#[from] VarIntDecodeError),

    #[error("connection rejected: per-IP rate limit exceeded")]
    RateLimited,

    #[error("authentication failed: {reason}")]
    AuthFailed { reason: &'static str },

    #[error("rendezvous failed: unknown conn_id")]
    UnknownConnId,

    #[error("resource cap exceeded: {0}")]
    CapExceeded(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
