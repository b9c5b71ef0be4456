//! Entry point for the arkdeck server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use arkdeck::config::Config;
use arkdeck::wallet::{Wallet, WalletCli};
use arkdeck::web::{self, PanelState};

/// Browser control panel for the bark Ark wallet CLI.
#[derive(Parser, Debug)]
#[command(name = "arkdeck", version, about)]
struct Cli {
    /// Interface to bind the HTTP server to.
    #[arg(long, env = "ARKDECK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind; the next ports are tried if it is taken.
    #[arg(long, env = "ARKDECK_PORT", default_value_t = 3000)]
    port: u16,

    /// Wallet data directory (default: ~/.bark).
    #[arg(long, env = "BARK_DATADIR")]
    datadir: Option<PathBuf>,

    /// Explicit path to the bark binary, overriding discovery.
    #[arg(long, env = "BARK_BIN")]
    bark_bin: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("arkdeck=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::resolve(cli.host, cli.port, cli.datadir, cli.bark_bin)?;

    let wallet_cli = WalletCli::locate(
        config.wallet_bin.clone(),
        config.datadir.clone(),
        config.exec_timeout,
    )?;
    tracing::info!(
        executable = %wallet_cli.executable().display(),
        datadir = %wallet_cli.datadir().display(),
        "wallet binary resolved"
    );

    let wallet = Arc::new(Wallet::new(wallet_cli, config.network, config.asp_url.clone()));
    let state = Arc::new(PanelState {
        wallet,
        expiry_threshold: config.expiry_threshold,
    });

    let (listener, addr) = web::bind(&config).await?;
    web::run(listener, addr, state).await?;
    Ok(())
}
