//! End-to-end integration tests for the control panel API.
//!
//! These tests start a real Axum server on a random port with a stub
//! wallet binary (a shell script), then drive the HTTP surface:
//! - JSON extraction from noisy CLI output
//! - failure classification and the `{error}` body contract
//! - success-despite-error reconciliation
//! - request validation rejecting bad bodies before any invocation

#![cfg(unix)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arkdeck::config::Network;
use arkdeck::wallet::{Wallet, WalletCli};
use arkdeck::web::{self, PanelState};

fn is_bind_permission_error<E: std::fmt::Display>(err: &E) -> bool {
    err.to_string().contains("Operation not permitted")
        || err.to_string().contains("failed to bind")
}

/// Write a stub wallet binary into `dir` and return its path.
fn stub_wallet(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("bark");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Start a panel server on a random port backed by the given stub.
async fn start_panel(stub: PathBuf, datadir: PathBuf) -> Option<SocketAddr> {
    let cli = WalletCli::locate(Some(stub), datadir, Duration::from_secs(10))
        .expect("stub wallet must resolve");
    let wallet = Arc::new(Wallet::new(cli, Network::Signet, None));
    let state = Arc::new(PanelState {
        wallet,
        expiry_threshold: 100,
    });

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) if is_bind_permission_error(&e) => return None,
        Err(e) => panic!("failed to bind test listener: {e:?}"),
    };
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = web::run(listener, addr, state).await;
    });

    Some(addr)
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

#[tokio::test]
async fn balance_extracts_json_from_noisy_output() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(
        dir.path(),
        r#"echo "2024-05-01 INFO syncing wallet"
echo '{"offchain_sat": 1500, "onchain_sat": 200, "pending_exit_sat": 25}'
echo "INFO done""#,
    );
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let body: serde_json::Value = reqwest::get(url(addr, "/api/balance"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["offchain_sat"], 1500);
    assert_eq!(body["onchain_sat"], 200);
    assert_eq!(body["pending_exit_sat"], 25);
    assert_eq!(body["total"], 1725);
}

#[tokio::test]
async fn balance_failure_surfaces_as_500_with_error_body() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(dir.path(), r#"echo "command not found" >&2; exit 127"#);
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let response = reqwest::get(url(addr, "/api/balance")).await.unwrap();
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(
        body["error"].as_str().unwrap().contains("command not found"),
        "error body must carry the stderr detail, got {body}"
    );
}

#[tokio::test]
async fn send_without_recipient_is_rejected_before_any_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("invoked");
    let stub = stub_wallet(dir.path(), &format!("touch {}", marker.display()));
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let client = reqwest::Client::new();
    let response = client
        .post(url(addr, "/api/send"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("recipient"));
    assert!(
        !marker.exists(),
        "gateway must not be invoked for an invalid request"
    );
}

#[tokio::test]
async fn send_requires_amount_for_non_invoice_recipients() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(dir.path(), "echo Payment sent");
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let client = reqwest::Client::new();
    let response = client
        .post(url(addr, "/api/send"))
        .json(&serde_json::json!({"recipient": "bc1qxyz"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // A Lightning invoice carries its own amount.
    let response = client
        .post(url(addr, "/api/send"))
        .json(&serde_json::json!({"recipient": "lnbc2500n1pexample"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn send_succeeds_when_evidence_overrides_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(
        dir.path(),
        r#"echo "ERROR round failed" >&2
echo "Payment sent! change registered" >&2
exit 1"#,
    );
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let client = reqwest::Client::new();
    let response = client
        .post(url(addr, "/api/send"))
        .json(&serde_json::json!({"recipient": "bc1qxyz", "amount": "12,345", "comment": "for the store"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn exit_with_empty_body_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(dir.path(), "exit 0");
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let client = reqwest::Client::new();
    let response = client
        .post(url(addr, "/api/exit"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Both at once is just as invalid as neither.
    let response = client
        .post(url(addr, "/api/exit"))
        .json(&serde_json::json!({"vtxoId": "abc:0", "exitAll": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn exit_acknowledges_immediately_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    // The stub sleeps longer than the test runs: the ack must not wait.
    let stub = stub_wallet(
        dir.path(),
        r#"shift 2
case "$1" in
  exit) sleep 30 ;;
esac"#,
    );
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let client = reqwest::Client::new();
    let started = std::time::Instant::now();
    let response = client
        .post(url(addr, "/api/exit"))
        .json(&serde_json::json!({"exitAll": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "detached exit must acknowledge without waiting"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["warning"].as_str().unwrap().contains("hours"));
}

#[tokio::test]
async fn vtxos_report_height_and_near_expiry_flags() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(
        dir.path(),
        r#"shift 2
case "$1" in
  sync) echo "Current block height: 1,000" ;;
  vtxos) echo '[
    {"id": "soon:0", "amount_sat": 5000, "vtxo_type": "round", "expiry_height": 1050},
    {"id": "later:1", "amount_sat": 800, "vtxo_type": "board", "expiry_height": 1200}
  ]' ;;
  *) echo "unknown command" >&2; exit 1 ;;
esac"#,
    );
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let body: serde_json::Value = reqwest::get(url(addr, "/api/vtxos"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["current_height"], 1000);
    let vtxos = body["vtxos"].as_array().unwrap();
    assert_eq!(vtxos.len(), 2);
    assert_eq!(vtxos[0]["id"], "soon:0");
    assert_eq!(vtxos[0]["near_expiry"], true);
    assert_eq!(vtxos[1]["type"], "board");
    assert_eq!(vtxos[1]["near_expiry"], false);
}

#[tokio::test]
async fn wallet_status_tracks_the_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(dir.path(), "exit 0");
    let datadir = dir.path().join("data");
    let Some(addr) = start_panel(stub, datadir.clone()).await else {
        return;
    };

    let body: serde_json::Value = reqwest::get(url(addr, "/api/wallet-status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["initialized"], false);

    std::fs::create_dir_all(&datadir).unwrap();
    std::fs::write(datadir.join("db.sqlite"), b"").unwrap();

    let body: serde_json::Value = reqwest::get(url(addr, "/api/wallet-status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["initialized"], true);
}

#[tokio::test]
async fn refresh_reports_success_message() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(dir.path(), r#"echo "Refresh done, 3 vtxos in round""#);
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let client = reqwest::Client::new();
    let response = client
        .post(url(addr, "/api/refresh-vtxos"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn static_client_is_served_at_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let stub = stub_wallet(dir.path(), "exit 0");
    let Some(addr) = start_panel(stub, dir.path().join("data")).await else {
        return;
    };

    let response = reqwest::get(url(addr, "/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let html = response.text().await.unwrap();
    assert!(html.contains("app.js"));
}
