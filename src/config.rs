//! Configuration for arkdeck.
//!
//! Settings are loaded with priority: CLI flag > env var > default.
//! `dotenvy` loads `./.env` early in startup, so env vars may also come
//! from a local dotfile.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Bitcoin network the wallet operates on, passed to `bark create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Bitcoin,
    Signet,
    Regtest,
}

impl Network {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" => Ok(Self::Bitcoin),
            "signet" => Ok(Self::Signet),
            "regtest" => Ok(Self::Regtest),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'bitcoin', 'signet', or 'regtest', got '{value}'"),
            }),
        }
    }

    /// The network selection flag understood by the wallet binary.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Bitcoin => "--bitcoin",
            Self::Signet => "--signet",
            Self::Regtest => "--regtest",
        }
    }
}

/// Resolved configuration for the control panel.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// First port to try; the next ports are fallbacks if it is taken.
    pub port: u16,
    /// How many consecutive ports to try before giving up.
    pub port_attempts: u16,
    /// Wallet persistent-data directory, passed as `--datadir`.
    pub datadir: PathBuf,
    /// Explicit path to the wallet binary, overriding discovery.
    pub wallet_bin: Option<PathBuf>,
    /// Default per-invocation timeout.
    pub exec_timeout: Duration,
    /// A VTXO closer than this many blocks to expiry is flagged.
    pub expiry_threshold: u64,
    /// Network used when creating a fresh wallet.
    pub network: Network,
    /// Ark server URL handed to `bark create`, if configured.
    pub asp_url: Option<String>,
}

impl Config {
    /// Resolve configuration from env vars, applying CLI overrides.
    pub fn resolve(
        host: String,
        port: u16,
        datadir: Option<PathBuf>,
        wallet_bin: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let datadir = datadir.unwrap_or_else(default_datadir);

        let exec_timeout = optional_env("BARK_EXEC_TIMEOUT_SECS")?
            .map(|s| s.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "BARK_EXEC_TIMEOUT_SECS".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?
            .unwrap_or(120);
        if exec_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BARK_EXEC_TIMEOUT_SECS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let expiry_threshold = optional_env("VTXO_EXPIRY_THRESHOLD")?
            .map(|s| s.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "VTXO_EXPIRY_THRESHOLD".to_string(),
                message: format!("must be a non-negative integer: {e}"),
            })?
            .unwrap_or(100);

        let network = Network::parse(
            &optional_env("BARK_NETWORK")?.unwrap_or_else(|| "signet".to_string()),
            "BARK_NETWORK",
        )?;

        Ok(Self {
            host,
            port,
            port_attempts: 10,
            datadir,
            wallet_bin,
            exec_timeout: Duration::from_secs(exec_timeout),
            expiry_threshold,
            network,
            asp_url: optional_env("BARK_ASP")?.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Default wallet data directory: `~/.bark`.
pub fn default_datadir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bark")
}

/// Read an env var, treating "not set" as `None` and non-UTF-8 as an error.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        }),
    }
}
