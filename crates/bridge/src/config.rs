//! Bridge configuration: TOML file, `clap` CLI overrides, and an
//! environment-variable override for the shared secret, in that ascending
//! order of precedence — matching `packet_inspector::config`'s
//! file-then-default precedence, plus an env layer for the one field that
//! should never be committed to disk.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Reverse tunnel broker rendezvous server")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on for both agents and players.
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind the listener to.
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Shared secret agents authenticate with (shared-secret mode only).
    #[arg(long)]
    pub secret: Option<String>,

    /// Base domain used for subdomain-based tenant routing.
    #[arg(long)]
    pub domain: Option<String>,

    /// Enable verbose debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Use claim-code/token authentication instead of a single shared secret.
    #[arg(long)]
    pub auth_enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub secret: String,
    pub token_expiry_hours: u32,
    pub code_expiry_minutes: u32,
    pub max_tokens_per_agent: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            token_expiry_hours: 24,
            code_expiry_minutes: 30,
            max_tokens_per_agent: 5,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BridgeConfig {
    pub port: u16,
    pub bind: IpAddr,
    pub secret: String,
    pub debug: bool,
    pub domain: Option<String>,
    pub auth: AuthConfig,
    /// Enables the lenient "any registered agent" routing fallback. Off by
    /// default: it breaks tenant isolation (see the design notes).
    pub lenient_routing_fallback: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 25577,
            bind: "0.0.0.0".parse().unwrap(),
            secret: String::new(),
            debug: false,
            domain: None,
            auth: AuthConfig::default(),
            lenient_routing_fallback: false,
        }
    }
}

impl BridgeConfig {
    /// Loads a config from `--config <path>` (falling back to defaults if
    /// no path is given or the file doesn't exist), applies CLI overrides,
    /// then applies the `BRIDGE_SECRET` environment override last.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            _ => BridgeConfig::default(),
        };

        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(bind) = cli.bind {
            config.bind = bind;
        }
        if let Some(secret) = &cli.secret {
            config.secret = secret.clone();
        }
        if let Some(domain) = &cli.domain {
            config.domain = Some(domain.clone());
        }
        if cli.debug {
            config.debug = true;
        }
        if cli.auth_enabled {
            config.auth.enabled = true;
        }

        if let Ok(env_secret) = std::env::var("BRIDGE_SECRET") {
            config.secret = env_secret;
        }

        Ok(config)
    }
}
