//! Axum HTTP server for the control panel.
//!
//! Serves the JSON API plus the embedded static client. CORS is
//! restricted to localhost origins: the panel is a local-first service
//! that drives a wallet.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use include_dir::{Dir, include_dir};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ServerError;
use crate::wallet::Wallet;

use super::handlers;

static PANEL_STATIC_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/src/web/static");

/// Shared state for all panel handlers.
pub struct PanelState {
    pub wallet: Arc<Wallet>,
    /// A VTXO closer than this many blocks to expiry is flagged.
    pub expiry_threshold: u64,
}

/// Bind the panel's listener, walking forward through fallback ports if
/// the configured one is taken. All exhausted is fatal.
pub async fn bind(config: &Config) -> Result<(TcpListener, SocketAddr), ServerError> {
    let last = config.port.saturating_add(config.port_attempts.saturating_sub(1));
    for port in config.port..=last {
        let addr = format!("{}:{}", config.host, port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                let bound = listener.local_addr()?;
                if port != config.port {
                    tracing::warn!(configured = config.port, bound = port, "configured port taken, using fallback");
                }
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(%addr, "port in use, trying next");
            }
            Err(e) => return Err(ServerError::Io(e)),
        }
    }
    Err(ServerError::PortsExhausted {
        host: config.host.clone(),
        first: config.port,
        last,
    })
}

/// Build the panel router for a server bound at `addr`.
pub fn router(state: Arc<PanelState>, addr: SocketAddr) -> Router {
    let api = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/balance", get(handlers::balance))
        .route("/api/vtxo-pubkey", get(handlers::vtxo_pubkey))
        .route("/api/vtxos", get(handlers::vtxos))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/refresh-vtxos", post(handlers::refresh))
        .route("/api/send", post(handlers::send))
        .route("/api/board", post(handlers::board))
        .route("/api/exit", post(handlers::exit))
        .route("/api/wallet-status", get(handlers::wallet_status))
        .route("/api/init-wallet", post(handlers::init_wallet))
        .route("/api/delete-wallet", post(handlers::delete_wallet))
        .route("/api/onchain-balance", get(handlers::onchain_balance))
        .route("/api/onchain-address", get(handlers::onchain_address));

    let statics = Router::new()
        .route("/", get(index_handler))
        .route("/app.js", get(js_handler))
        .route("/style.css", get(css_handler))
        .route("/favicon.ico", get(favicon_handler));

    // CORS: same-origin localhost only. The panel drives a wallet; no
    // foreign origin has any business calling it.
    let cors = CorsLayer::new()
        .allow_origin([
            format!("http://{}:{}", addr.ip(), addr.port())
                .parse()
                .expect("valid origin"),
            format!("http://localhost:{}", addr.port())
                .parse()
                .expect("valid origin"),
        ])
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE]));

    Router::new()
        .merge(api)
        .merge(statics)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64 KB max request body
        .with_state(state)
}

/// Serve the panel on an already-bound listener until shutdown.
pub async fn run(
    listener: TcpListener,
    addr: SocketAddr,
    state: Arc<PanelState>,
) -> std::io::Result<()> {
    let app = router(state, addr);
    tracing::info!("control panel listening on http://{addr}");
    axum::serve(listener, app).await
}

// --- Static file handlers ---

async fn index_handler() -> impl IntoResponse {
    static_asset_response("index.html")
}

async fn js_handler() -> impl IntoResponse {
    static_asset_response("app.js")
}

async fn css_handler() -> impl IntoResponse {
    static_asset_response("style.css")
}

async fn favicon_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

fn static_asset_response(filename: &str) -> Response {
    let Some(file) = PANEL_STATIC_DIR.get_file(filename) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let content_type = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let mut response = Response::new(Body::from(file.contents().to_vec()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, max-age=0"),
    );
    response
}
