//! Agent configuration: TOML file + `clap` CLI overrides + an environment
//! override for the credential, mirroring `bridge::config`.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Outbound-only client for the reverse tunnel broker")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bridge hostname to dial for both control and data channels.
    #[arg(long)]
    pub bridge_host: Option<String>,

    /// Bridge port to dial.
    #[arg(long)]
    pub bridge_port: Option<u16>,

    /// Hostname of the local service this agent exposes.
    #[arg(long)]
    pub local_host: Option<String>,

    /// Port of the local service this agent exposes.
    #[arg(long)]
    pub local_port: Option<u16>,

    /// Credential to authenticate with: a shared secret, a claim code, or a token.
    #[arg(long)]
    pub secret: Option<String>,

    /// Requested subdomain (shared-secret mode only).
    #[arg(long)]
    pub subdomain: Option<String>,

    /// Enable verbose debug logging.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AgentConfig {
    pub bridge_host: String,
    pub bridge_port: u16,
    pub local_host: String,
    pub local_port: u16,
    pub secret: String,
    pub subdomain: Option<String>,
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bridge_host: "127.0.0.1".to_owned(),
            bridge_port: 25577,
            local_host: "127.0.0.1".to_owned(),
            local_port: 25565,
            secret: String::new(),
            subdomain: None,
            debug: false,
        }
    }
}

impl AgentConfig {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            _ => AgentConfig::default(),
        };

        if let Some(v) = &cli.bridge_host {
            config.bridge_host = v.clone();
        }
        if let Some(v) = cli.bridge_port {
            config.bridge_port = v;
        }
        if let Some(v) = &cli.local_host {
            config.local_host = v.clone();
        }
        if let Some(v) = cli.local_port {
            config.local_port = v;
        }
        if let Some(v) = &cli.secret {
            config.secret = v.clone();
        }
        if let Some(v) = &cli.subdomain {
            config.subdomain = Some(v.clone());
        }
        if cli.debug {
            config.debug = true;
        }

        if let Ok(env_secret) = std::env::var("AGENT_SECRET") {
            config.secret = env_secret;
        }

        Ok(config)
    }
}
