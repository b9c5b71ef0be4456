//! Typed wallet operations.
//!
//! The one place CLI argument contracts live. Every operation runs through
//! the gateway, is classified by the interpreter, and maps ambiguous
//! success to success. Mutating operations are never retried: re-sending a
//! payment is not safe.

use std::time::Duration;

use uuid::Uuid;

use crate::config::Network;
use crate::error::{GatewayError, WalletError};

use super::gateway::{RawResult, WalletCli};
use super::interpret::{ExpectedShape, Outcome, extract_block_height, interpret, parse_sat_amount};
use super::model::{Balance, Vtxo};

/// Round-participating operations (send, board, refresh) can block on the
/// Ark server batching; they get a longer leash than queries.
const ROUND_TIMEOUT: Duration = Duration::from_secs(600);

/// What a unilateral exit should withdraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitTarget {
    Vtxo(String),
    All,
}

/// Facade over the wallet binary: the operation catalog.
#[derive(Debug, Clone)]
pub struct Wallet {
    cli: WalletCli,
    network: Network,
    asp_url: Option<String>,
}

impl Wallet {
    pub fn new(cli: WalletCli, network: Network, asp_url: Option<String>) -> Self {
        Self {
            cli,
            network,
            asp_url,
        }
    }

    pub fn cli(&self) -> &WalletCli {
        &self.cli
    }

    pub async fn balance(&self) -> Result<Balance, WalletError> {
        let raw = self.cli.execute("balance", &args(["balance"]), None).await?;
        match classify("balance", &raw, ExpectedShape::JsonObject)? {
            Outcome::Structured(value) => {
                Balance::from_json(&value).ok_or_else(|| parse_error("balance", &raw))
            }
            Outcome::Fields(fields) => {
                let offchain = fields.amount_sat("offchain_sat").or_else(|| fields.amount_sat("offchain_balance"));
                let onchain = fields.amount_sat("onchain_sat").or_else(|| fields.amount_sat("onchain_balance"));
                if offchain.is_none() && onchain.is_none() {
                    return Err(parse_error("balance", &raw));
                }
                Ok(Balance {
                    offchain_sat: offchain.unwrap_or(0),
                    onchain_sat: onchain.unwrap_or(0),
                    pending_exit_sat: fields
                        .amount_sat("pending_exit_sat")
                        .or_else(|| fields.amount_sat("pending_exit"))
                        .unwrap_or(0),
                })
            }
            _ => Err(parse_error("balance", &raw)),
        }
    }

    pub async fn vtxo_pubkey(&self) -> Result<String, WalletError> {
        let raw = self
            .cli
            .execute("vtxo-pubkey", &args(["vtxo-pubkey"]), None)
            .await?;
        extract_value("vtxo-pubkey", &raw)
    }

    /// The VTXO set the wallet currently tracks.
    pub async fn vtxos(&self) -> Result<Vec<Vtxo>, WalletError> {
        let raw = self.cli.execute("vtxos", &args(["vtxos"]), None).await?;
        match classify("vtxos", &raw, ExpectedShape::JsonArray)? {
            Outcome::Structured(serde_json::Value::Array(entries)) => {
                let mut vtxos = Vec::with_capacity(entries.len());
                for entry in &entries {
                    match Vtxo::from_json(entry) {
                        Some(vtxo) => vtxos.push(vtxo),
                        None => {
                            tracing::warn!(entry = %entry, "skipping malformed vtxo entry");
                        }
                    }
                }
                Ok(vtxos)
            }
            _ => Err(parse_error("vtxos", &raw)),
        }
    }

    /// Current chain height, from a sync invocation. 0 means unknown.
    pub async fn current_height(&self) -> u64 {
        match self.cli.execute("sync", &args(["sync"]), None).await {
            Ok(raw) => extract_block_height(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "sync invocation failed, height unknown");
                0
            }
        }
    }

    /// Refresh all VTXOs in a round, extending their expiry.
    pub async fn refresh_all(&self) -> Result<String, WalletError> {
        let raw = self
            .cli
            .execute("refresh", &args(["refresh", "--all"]), Some(ROUND_TIMEOUT))
            .await?;
        classify_action("refresh", &raw).map(|detail| {
            detail.unwrap_or_else(|| "VTXOs refreshed in a round".to_string())
        })
    }

    /// Send to an address, VTXO pubkey, or Lightning invoice.
    ///
    /// The recipient and comment are discrete arguments — they may contain
    /// spaces or quotes and must never pass through a shell string.
    pub async fn send(
        &self,
        recipient: &str,
        amount_sat: Option<u64>,
        comment: Option<&str>,
    ) -> Result<String, WalletError> {
        let mut send_args = args(["send"]);
        send_args.push(recipient.to_string());
        if let Some(amount) = amount_sat {
            send_args.push(format!("{amount}sat"));
        }
        if let Some(comment) = comment {
            send_args.push(comment.to_string());
        }

        let raw = self
            .cli
            .execute("send", &send_args, Some(ROUND_TIMEOUT))
            .await?;
        classify_action("send", &raw)
            .map(|detail| detail.unwrap_or_else(|| "Payment sent".to_string()))
    }

    /// Move on-chain funds into the Ark, creating a new VTXO.
    pub async fn board(&self, amount_sat: Option<u64>) -> Result<String, WalletError> {
        let mut board_args = args(["board"]);
        match amount_sat {
            Some(amount) => board_args.push(format!("{amount}sat")),
            None => board_args.push("--all".to_string()),
        }

        let raw = self
            .cli
            .execute("board", &board_args, Some(ROUND_TIMEOUT))
            .await?;
        classify_action("board", &raw)
            .map(|detail| detail.unwrap_or_else(|| "Boarding transaction broadcast".to_string()))
    }

    /// Start a unilateral exit without waiting for it — exits take on the
    /// order of hours and outlive any HTTP request. Completion is only
    /// observable in the logs, keyed by the returned invocation id.
    pub fn start_exit(&self, target: &ExitTarget) -> Result<Uuid, GatewayError> {
        let exit_args = match target {
            ExitTarget::Vtxo(id) => args(["exit", "--vtxo", id.as_str()]),
            ExitTarget::All => args(["exit", "--all"]),
        };
        self.cli.execute_detached("exit", &exit_args)
    }

    pub async fn onchain_balance(&self) -> Result<u64, WalletError> {
        let raw = self
            .cli
            .execute("onchain-balance", &args(["onchain", "balance"]), None)
            .await?;
        match classify("onchain-balance", &raw, ExpectedShape::PlainText)? {
            Outcome::Fields(fields) => fields
                .value()
                .and_then(first_sat_amount)
                .ok_or_else(|| parse_error("onchain-balance", &raw)),
            Outcome::Structured(value) => value
                .get("onchain_sat")
                .or_else(|| value.get("balance"))
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| parse_error("onchain-balance", &raw)),
            _ => Err(parse_error("onchain-balance", &raw)),
        }
    }

    pub async fn onchain_address(&self) -> Result<String, WalletError> {
        let raw = self
            .cli
            .execute("onchain-address", &args(["onchain", "address"]), None)
            .await?;
        extract_value("onchain-address", &raw)
    }

    /// Whether a wallet exists in the data directory. No invocation; the
    /// wallet binary would error out on most commands before a `create`.
    pub fn is_initialized(&self) -> bool {
        std::fs::read_dir(self.cli.datadir())
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Create a fresh wallet in the data directory.
    pub async fn create(&self) -> Result<(), WalletError> {
        let mut create_args = args(["create", self.network.flag()]);
        if let Some(asp) = &self.asp_url {
            create_args.push("--asp".to_string());
            create_args.push(asp.clone());
        }

        let raw = self
            .cli
            .execute("create", &create_args, Some(ROUND_TIMEOUT))
            .await?;
        classify_action("create", &raw).map(|_| ())
    }

    /// Delete the wallet's persistent store. Irreversible.
    pub fn delete(&self) -> std::io::Result<()> {
        let datadir = self.cli.datadir();
        if datadir.exists() {
            tracing::info!(datadir = %datadir.display(), "deleting wallet data directory");
            std::fs::remove_dir_all(datadir)?;
        }
        Ok(())
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Map `Failure` outcomes to typed errors: a live process with unusable
/// output is a parse error (the binary broke its contract), a dead one a
/// domain failure. Everything else passes through.
fn classify(
    operation: &str,
    raw: &RawResult,
    shape: ExpectedShape,
) -> Result<Outcome, WalletError> {
    match interpret(raw, shape) {
        Outcome::Failure(detail) => {
            if raw.process_succeeded {
                tracing::error!(
                    %operation,
                    stdout = %raw.stdout.trim(),
                    stderr = %raw.stderr.trim(),
                    "unparseable output from successful wallet invocation"
                );
                Err(WalletError::Parse {
                    operation: operation.to_string(),
                    detail,
                })
            } else {
                Err(WalletError::Domain {
                    operation: operation.to_string(),
                    detail,
                })
            }
        }
        outcome => Ok(outcome),
    }
}

/// Classify a mutating operation where only success/failure matters.
/// Returns the evidence text when the outcome was ambiguous.
fn classify_action(operation: &str, raw: &RawResult) -> Result<Option<String>, WalletError> {
    match classify(operation, raw, ExpectedShape::PlainText)? {
        Outcome::AmbiguousSuccess(evidence) => {
            tracing::info!(%operation, %evidence, "success evidence overrode process failure");
            Ok(Some(evidence))
        }
        _ => Ok(None),
    }
}

fn extract_value(operation: &str, raw: &RawResult) -> Result<String, WalletError> {
    match classify(operation, raw, ExpectedShape::LineValue)? {
        Outcome::Fields(fields) => fields
            .value()
            .map(str::to_string)
            .ok_or_else(|| parse_error(operation, raw)),
        _ => Err(parse_error(operation, raw)),
    }
}

/// Scan free text for a sat amount. A number carrying a `sat` suffix wins
/// over bare numeric tokens, so log timestamps don't masquerade as
/// balances.
fn first_sat_amount(text: &str) -> Option<u64> {
    static AMOUNT_RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = AMOUNT_RE
        .get_or_init(|| regex::Regex::new(r"(?i)([0-9][0-9,_]*)\s*sats?\b").expect("static regex"));

    if let Some(caps) = re.captures(text) {
        return parse_sat_amount(&caps[1]);
    }
    text.split_whitespace().find_map(parse_sat_amount)
}

fn parse_error(operation: &str, raw: &RawResult) -> WalletError {
    tracing::error!(
        %operation,
        stdout = %raw.stdout.trim(),
        stderr = %raw.stderr.trim(),
        "wallet output did not contain the expected data"
    );
    WalletError::Parse {
        operation: operation.to_string(),
        detail: "could not parse output".to_string(),
    }
}
