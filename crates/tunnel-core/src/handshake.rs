//! Decoding of the Minecraft handshake packet, used only to sniff the
//! `serverAddress` field for tenant routing. Decoding is best-effort: a
//! failure never drops the underlying connection by itself (see the
//! Bridge's player-classification logic), it only falls through to the
//! default-agent routing path.

use thiserror::Error;

use crate::varint;

/// Server-address fields longer than this are almost certainly not a real
/// Minecraft handshake and are rejected outright.
pub const MAX_SERVER_ADDRESS_LEN: i32 = 1024;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
pub enum HandshakeDecodeError {
    #[error("buffer ended before the handshake was fully read")]
    ShortBuffer,
    #[error("VarInt in handshake is malformed")]
    BadVarInt,
    #[error("packet id is not 0 (not a handshake packet)")]
    NotAHandshake,
    #[error("serverAddress length is out of bounds")]
    AddressLengthOutOfBounds,
    #[error("serverAddress is not valid UTF-8")]
    InvalidUtf8,
    #[error("declared packetLength does not match bytes actually consumed")]
    FrameMismatch,
}

impl From<varint::VarIntDecodeError> for HandshakeDecodeError {
    fn from(_: varint::VarIntDecodeError) -> Self {
        HandshakeDecodeError::BadVarInt
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: i32,
}

/// Decodes a handshake packet from the front of `buf`.
///
/// This is routing-only: callers must not treat a successful decode as
/// evidence the peer is a well-behaved Minecraft client, and must not treat
/// a failed decode as grounds to close the connection (only to skip
/// subdomain-based routing).
pub fn decode(buf: &[u8]) -> Result<Handshake, HandshakeDecodeError> {
    let mut pos = 0usize;

    let (packet_length, n) = varint::decode(&buf[pos..])?;
    pos += n;
    let header_len = n;

    let (packet_id, n) = varint::decode(&buf[pos..])?;
    pos += n;
    if packet_id != 0 {
        return Err(HandshakeDecodeError::NotAHandshake);
    }

    let (protocol_version, n) = varint::decode(&buf[pos..])?;
    pos += n;

    let (addr_len, n) = varint::decode(&buf[pos..])?;
    pos += n;
    if !(0..=MAX_SERVER_ADDRESS_LEN).contains(&addr_len) {
        return Err(HandshakeDecodeError::AddressLengthOutOfBounds);
    }
    let addr_len = addr_len as usize;

    let addr_bytes = buf
        .get(pos..pos + addr_len)
        .ok_or(HandshakeDecodeError::ShortBuffer)?;
    let server_address =
        std::str::from_utf8(addr_bytes).map_err(|_| HandshakeDecodeError::InvalidUtf8)?.to_owned();
    pos += addr_len;

    let port_bytes = buf
        .get(pos..pos + 2)
        .ok_or(HandshakeDecodeError::ShortBuffer)?;
    let server_port = u16::from_be_bytes([port_bytes[0], port_bytes[1]]);
    pos += 2;

    let (next_state, n) = varint::decode(&buf[pos..])?;
    pos += n;

    let consumed_after_length = pos - header_len;
    if consumed_after_length as i32 != packet_length {
        return Err(HandshakeDecodeError::FrameMismatch);
    }

    Ok(Handshake {
        protocol_version,
        server_address,
        server_port,
        next_state,
    })
}

/// Encodes a handshake packet, symmetric with [`decode`]. Used by tests and
/// by anything synthesizing handshake framing.
pub fn encode(h: &Handshake) -> Vec<u8> {
    let mut body = Vec::new();
    varint::encode(0, &mut body).expect("packet id 0 is non-negative");
    varint::encode(h.protocol_version, &mut body).expect("protocol_version must be non-negative");
    varint::encode(h.server_address.len() as i32, &mut body)
        .expect("address length must be non-negative");
    body.extend_from_slice(h.server_address.as_bytes());
    body.extend_from_slice(&h.server_port.to_be_bytes());
    varint::encode(h.next_state, &mut body).expect("next_state must be non-negative");

    let mut out = Vec::new();
    varint::encode(body.len() as i32, &mut out).expect("body length must be non-negative");
    out.extend_from_slice(&body);
    out
}

/// Extracts the routing label from `server_address` per the Bridge's tenant
/// resolution rules: if `domain` is configured and `server_address` ends
/// with `.{domain}`, the single leftmost label is the tenant id (and must
/// not itself contain a dot); otherwise the first dot-separated label is
/// used.
pub fn routing_label<'a>(server_address: &'a str, domain: Option<&str>) -> Option<&'a str> {
    if let Some(domain) = domain {
        let suffix = format!(".{domain}");
        if let Some(prefix) = server_address.strip_suffix(&suffix) {
            if prefix.is_empty() || prefix.contains('.') {
                return None;
            }
            return Some(prefix);
        }
    }

    server_address.split('.').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Handshake {
        Handshake {
            protocol_version: 763,
            server_address: "survival.bridge.com".to_owned(),
            server_port: 25565,
            next_state: 2,
        }
    }

    #[test]
    fn round_trip() {
        let h = sample();
        let buf = encode(&h);
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn frame_mismatch_on_truncation() {
        let h = sample();
        let mut buf = encode(&h);
        buf.truncate(buf.len() - 1);
        // Either a short read or a frame mismatch is acceptable; both are
        // decode failures that must not panic.
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn rejects_oversize_address_length() {
        let mut buf = Vec::new();
        varint::encode(10, &mut buf).unwrap(); // bogus packetLength, irrelevant here
        varint::encode(0, &mut buf).unwrap();
        varint::encode(0, &mut buf).unwrap();
        varint::encode(2000, &mut buf).unwrap();
        assert_eq!(
            decode(&buf),
            Err(HandshakeDecodeError::AddressLengthOutOfBounds)
        );
    }

    #[test]
    fn routing_label_with_domain_suffix() {
        assert_eq!(
            routing_label("survival.bridge.com", Some("bridge.com")),
            Some("survival")
        );
    }

    #[test]
    fn routing_label_rejects_nested_label_before_suffix() {
        // "a.b.bridge.com" -> prefix "a.b" contains a dot, not a valid tenant label.
        assert_eq!(routing_label("a.b.bridge.com", Some("bridge.com")), None);
    }

    #[test]
    fn routing_label_falls_back_to_first_label() {
        assert_eq!(routing_label("survival.example.net", None), Some("survival"));
        assert_eq!(routing_label("localhost", Some("bridge.com")), Some("localhost"));
    }
}
