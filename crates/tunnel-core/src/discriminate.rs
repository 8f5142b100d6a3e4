//! Protocol discrimination: classifying a freshly-accepted, still-`UNKNOWN`
//! connection from the first bytes it sends, ahead of any PROXY-header
//! stripping the caller has already folded in.

use crate::proxy_header::{self, ProxyHeaderOutcome};

const DATA_PREFIX: &[u8] = b"DATA ";
const AUTH_PREFIX: &[u8] = b"AUTH ";

/// Outcome of inspecting the accumulated discrimination buffer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Discrimination {
    /// Not enough bytes buffered yet; caller should read more (subject to
    /// its own `MAX_BUFFER_SIZE` cap).
    NeedMoreData,
    /// `buf[player_offset..]` is the player's initial payload, after any
    /// PROXY header has been stripped.
    Player { player_offset: usize },
    /// `buf[offset..line_end]` is an `AUTH `/`DATA ` command line including
    /// its trailing `\n`; `buf[line_end..]` is the coalesced initial
    /// payload that followed it in the same read.
    AgentCommand {
        kind: AgentCommandKind,
        offset: usize,
        line_end: usize,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AgentCommandKind {
    Auth,
    Data,
}

fn is_strict_prefix_of(needle: &[u8], haystack: &[u8]) -> bool {
    needle.len() < haystack.len() && haystack.starts_with(needle)
}

/// Classifies `buf`, the raw bytes accumulated so far on a still-`UNKNOWN`
/// connection (PROXY header included, if any).
pub fn classify(buf: &[u8]) -> Discrimination {
    let header_len = match proxy_header::detect(buf) {
        ProxyHeaderOutcome::Incomplete => return Discrimination::NeedMoreData,
        ProxyHeaderOutcome::Present(n) => n,
        ProxyHeaderOutcome::Absent => 0,
    };

    let eff = &buf[header_len..];

    if eff.len() < 6 {
        let looks_like_command_prefix = is_strict_prefix_of(eff, DATA_PREFIX)
            || is_strict_prefix_of(eff, AUTH_PREFIX)
            || is_strict_prefix_of(eff, &proxy_header::V2_SIGNATURE);
        if looks_like_command_prefix {
            return Discrimination::NeedMoreData;
        }
        if eff.len() > 2 {
            return Discrimination::Player {
                player_offset: header_len,
            };
        }
        return Discrimination::NeedMoreData;
    }

    let head = &eff[..5];
    let kind = if head == DATA_PREFIX {
        Some(AgentCommandKind::Data)
    } else if head == AUTH_PREFIX {
        Some(AgentCommandKind::Auth)
    } else {
        None
    };

    match kind {
        Some(kind) => match eff.iter().position(|&b| b == b'\n') {
            Some(idx) => Discrimination::AgentCommand {
                kind,
                offset: header_len,
                line_end: header_len + idx + 1,
            },
            None => Discrimination::NeedMoreData,
        },
        None => Discrimination::Player {
            player_offset: header_len,
        },
    }
}
