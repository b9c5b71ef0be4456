//! Error types for arkdeck.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for the control panel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the command gateway while invoking the wallet binary.
///
/// A non-zero exit status from the binary is NOT an error here; it comes
/// back as data inside [`crate::wallet::RawResult`]. Only failures to run
/// the process at all are represented.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("wallet executable not found (looked for '{name}' next to the server and on PATH)")]
    ExecutableNotFound { name: String },

    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wallet invocation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("IO error while running wallet binary: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when a wallet invocation ran but its result is unusable.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// The process succeeded but its output matched no known shape.
    /// A contract violation of the external binary, never a silent success.
    #[error("could not parse output of '{operation}': {detail}")]
    Parse { operation: String, detail: String },

    /// The external binary reported a real failure (no success evidence found).
    #[error("wallet command '{operation}' failed: {detail}")]
    Domain { operation: String, detail: String },
}

/// HTTP server startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {host}: no free port in {first}..={last}")]
    PortsExhausted { host: String, first: u16, last: u16 },

    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the control panel.
pub type Result<T> = std::result::Result<T, Error>;
