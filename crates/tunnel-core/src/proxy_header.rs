//! Detection and stripping of HAProxy PROXY protocol v1/v2 preambles ahead
//! of the Bridge's own protocol discrimination.

/// The 12-byte signature that opens every PROXY protocol v2 header.
pub const V2_SIGNATURE: [u8; 12] = [
    0x0D, 0x0A, 0x0D, 0x0A, 0x00, 0x0D, 0x0A, 0x51, 0x55, 0x49, 0x54, 0x0A,
];

const V1_PREFIX: &[u8] = b"PROXY ";

/// Result of inspecting a prefix buffer for a PROXY header.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProxyHeaderOutcome {
    /// No PROXY header is present; user data starts at offset 0.
    Absent,
    /// Not enough bytes buffered yet to decide; caller should read more.
    Incomplete,
    /// A PROXY header is present and occupies the first `n` bytes.
    Present(usize),
}

/// Inspects `buf` for a PROXY v1 or v2 header.
pub fn detect(buf: &[u8]) -> ProxyHeaderOutcome {
    if let Some(outcome) = detect_v1(buf) {
        return outcome;
    }
    if let Some(outcome) = detect_v2(buf) {
        return outcome;
    }
    ProxyHeaderOutcome::Absent
}

fn detect_v1(buf: &[u8]) -> Option<ProxyHeaderOutcome> {
    let probe_len = buf.len().min(V1_PREFIX.len());
    if buf[..probe_len] != V1_PREFIX[..probe_len] {
        return None;
    }
    if probe_len < V1_PREFIX.len() {
        return Some(ProxyHeaderOutcome::Incomplete);
    }
    match buf.iter().position(|&b| b == b'\n') {
        Some(idx) => Some(ProxyHeaderOutcome::Present(idx + 1)),
        None => Some(ProxyHeaderOutcome::Incomplete),
    }
}

fn detect_v2(buf: &[u8]) -> Option<ProxyHeaderOutcome> {
    let probe_len = buf.len().min(V2_SIGNATURE.len());
    if buf[..probe_len] != V2_SIGNATURE[..probe_len] {
        return None;
    }
    if buf.len() < 16 {
        return Some(ProxyHeaderOutcome::Incomplete);
    }
    let body_len = u16::from_be_bytes([buf[14], buf[15]]) as usize;
    Some(ProxyHeaderOutcome::Present(16 + body_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_for_ordinary_bytes() {
        assert_eq!(detect(b"\x16\x03\x01hello"), ProxyHeaderOutcome::Absent);
    }

    #[test]
    fn v1_incomplete_then_present() {
        assert_eq!(detect(b"PROX"), ProxyHeaderOutcome::Incomplete);
        assert_eq!(
            detect(b"PROXY TCP4 1.2.3.4 5.6.7.8 1 2\n"),
            ProxyHeaderOutcome::Present(32)
        );
    }

    #[test]
    fn v1_incomplete_without_newline() {
        assert_eq!(detect(b"PROXY TCP4 1.2.3.4"), ProxyHeaderOutcome::Incomplete);
    }

    #[test]
    fn v2_incomplete_then_present() {
        let mut prefix = V2_SIGNATURE.to_vec();
        prefix.truncate(8);
        assert_eq!(detect(&prefix), ProxyHeaderOutcome::Incomplete);

        let mut full = V2_SIGNATURE.to_vec();
        full.push(0x21); // ver/cmd
        full.push(0x11); // fam/proto
        full.extend_from_slice(&12u16.to_be_bytes());
        full.extend_from_slice(&[0u8; 12]);
        assert_eq!(detect(&full), ProxyHeaderOutcome::Present(28));
    }
}
