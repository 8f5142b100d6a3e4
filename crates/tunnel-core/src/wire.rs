//! Parsing and rendering of the Bridge's line-oriented control protocol.

/// A parsed `AUTH <credential> [<subdomain>]` command line (trailing `\n`
/// already stripped).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AuthCommand {
    pub credential: String,
    pub subdomain: Option<String>,
}

/// A parsed `DATA <conn_id>` command line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DataCommand {
    pub conn_id: String,
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut line = line;
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    line
}

/// Parses an `AUTH ...` line. `line` must not include the trailing
/// newline consumed by the caller during discrimination, but tolerates one
/// anyway.
pub fn parse_auth(line: &[u8]) -> Option<AuthCommand> {
    let line = trim_line(line);
    let text = std::str::from_utf8(line).ok()?;
    let mut parts = text.split_ascii_whitespace();
    if parts.next()? != "AUTH" {
        return None;
    }
    let credential = parts.next()?.to_owned();
    let subdomain = parts.next().map(str::to_owned);
    if parts.next().is_some() {
        return None; // too many tokens: malformed
    }
    Some(AuthCommand {
        credential,
        subdomain,
    })
}

/// Parses a `DATA <conn_id>` line.
pub fn parse_data(line: &[u8]) -> Option<DataCommand> {
    let line = trim_line(line);
    let text = std::str::from_utf8(line).ok()?;
    let mut parts = text.split_ascii_whitespace();
    if parts.next()? != "DATA" {
        return None;
    }
    let conn_id = parts.next()?.to_owned();
    if parts.next().is_some() {
        return None;
    }
    Some(DataCommand { conn_id })
}

pub fn connect_line(conn_id: &str) -> String {
    format!("CONNECT {conn_id}\n")
}

pub fn data_line(conn_id: &str) -> String {
    format!("DATA {conn_id}\n")
}

pub fn auth_line(credential: &str, subdomain: Option<&str>) -> String {
    match subdomain {
        Some(s) => format!("AUTH {credential} {s}\n"),
        None => format!("AUTH {credential}\n"),
    }
}

/// Bridge -> Agent authentication outcomes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AuthReply {
    Ok {
        assigned_domain: String,
        token: Option<String>,
    },
    Fail,
    FailLocked,
    FailInUse,
    FailInvalidFormat,
    FailInvalidCredentials,
    FailAgentAlreadyConnected,
}

impl AuthReply {
    pub fn render(&self) -> String {
        match self {
            AuthReply::Ok {
                assigned_domain,
                token: Some(token),
            } => format!("AUTH_OK {assigned_domain} {token}\n"),
            AuthReply::Ok {
                assigned_domain,
                token: None,
            } => format!("AUTH_OK {assigned_domain}\n"),
            AuthReply::Fail => "AUTH_FAIL\n".to_owned(),
            AuthReply::FailLocked => "AUTH_FAIL_LOCKED\n".to_owned(),
            AuthReply::FailInUse => "AUTH_FAIL_IN_USE\n".to_owned(),
            AuthReply::FailInvalidFormat => "AUTH_FAIL_INVALID_FORMAT\n".to_owned(),
            AuthReply::FailInvalidCredentials => "AUTH_FAIL_INVALID_CREDENTIALS\n".to_owned(),
            AuthReply::FailAgentAlreadyConnected => {
                "AUTH_FAIL_AGENT_ALREADY_CONNECTED\n".to_owned()
            }
        }
    }
}

/// Parses a line the Agent receives from the Bridge control channel.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ControlLine {
    AuthOk {
        assigned_domain: String,
        token: Option<String>,
    },
    AuthFail(String),
    Connect { conn_id: String },
    Other,
}

pub fn parse_control_line(line: &str) -> ControlLine {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.split_ascii_whitespace();
    match parts.next() {
        Some("AUTH_OK") => {
            let assigned_domain = parts.next().unwrap_or_default().to_owned();
            let token = parts.next().map(str::to_owned);
            ControlLine::AuthOk {
                assigned_domain,
                token,
            }
        }
        Some(tag) if tag.starts_with("AUTH_FAIL") => ControlLine::AuthFail(tag.to_owned()),
        Some("CONNECT") => match parts.next() {
            Some(id) => ControlLine::Connect {
                conn_id: id.to_owned(),
            },
            None => ControlLine::Other,
        },
        _ => ControlLine::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_with_subdomain() {
        let cmd = parse_auth(b"AUTH s alpha\n").unwrap();
        assert_eq!(cmd.credential, "s");
        assert_eq!(cmd.subdomain.as_deref(), Some("alpha"));
    }

    #[test]
    fn parses_auth_without_subdomain() {
        let cmd = parse_auth(b"AUTH s").unwrap();
        assert_eq!(cmd.credential, "s");
        assert_eq!(cmd.subdomain, None);
    }

    #[test]
    fn rejects_malformed_auth() {
        assert!(parse_auth(b"AUTH").is_none());
        assert!(parse_auth(b"AUTH a b c").is_none());
        assert!(parse_auth(b"NOPE a").is_none());
    }

    #[test]
    fn parses_data_line() {
        let cmd = parse_data(b"DATA abc-123\n").unwrap();
        assert_eq!(cmd.conn_id, "abc-123");
    }

    #[test]
    fn renders_auth_ok_with_and_without_token() {
        assert_eq!(
            AuthReply::Ok {
                assigned_domain: "alpha.bridge".to_owned(),
                token: None,
            }
            .render(),
            "AUTH_OK alpha.bridge\n"
        );
        assert_eq!(
            AuthReply::Ok {
                assigned_domain: "alpha.ns".to_owned(),
                token: Some("deadbeef".to_owned()),
            }
            .render(),
            "AUTH_OK alpha.ns deadbeef\n"
        );
    }

    #[test]
    fn parses_control_lines() {
        assert_eq!(
            parse_control_line("AUTH_OK alpha.bridge\n"),
            ControlLine::AuthOk {
                assigned_domain: "alpha.bridge".to_owned(),
                token: None
            }
        );
        assert_eq!(
            parse_control_line("CONNECT abc-123"),
            ControlLine::Connect {
                conn_id: "abc-123".to_owned()
            }
        );
        assert_eq!(
            parse_control_line("AUTH_FAIL_LOCKED"),
            ControlLine::AuthFail("AUTH_FAIL_LOCKED".to_owned())
        );
        assert_eq!(parse_control_line("garbage"), ControlLine::Other);
    }
}
