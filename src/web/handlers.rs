//! API handlers for the control panel.
//!
//! Request validation (400) happens before any wallet invocation; wallet
//! and gateway failures surface as 500 with an `{error}` body. Ambiguous
//! success from the interpreter is plain success up here.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::wallet::ExitTarget;

use super::server::PanelState;
use super::types::*;

/// Lightning invoice prefixes (BOLT11 human-readable parts across
/// networks). Invoices carry their own amount, so `amount` is optional
/// for them.
const LN_INVOICE_PREFIXES: &[&str] = &["lnbc", "lntbs", "lntb", "lnbcrt"];

pub fn is_lightning_invoice(recipient: &str) -> bool {
    let lower = recipient.to_ascii_lowercase();
    LN_INVOICE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub async fn balance(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.wallet.balance().await?;
    Ok(Json(balance.into()))
}

pub async fn vtxo_pubkey(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<PubkeyResponse>, ApiError> {
    let pubkey = state.wallet.vtxo_pubkey().await?;
    Ok(Json(PubkeyResponse { pubkey }))
}

pub async fn vtxos(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<VtxosResponse>, ApiError> {
    let current_height = state.wallet.current_height().await;
    let vtxos = state.wallet.vtxos().await?;
    let entries = vtxos
        .into_iter()
        .map(|vtxo| VtxoEntry::new(vtxo, current_height, state.expiry_threshold))
        .collect();
    Ok(Json(VtxosResponse {
        current_height,
        vtxos: entries,
    }))
}

pub async fn refresh(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let message = state.wallet.refresh_all().await?;
    Ok(Json(RefreshResponse {
        success: true,
        message,
    }))
}

pub async fn send(
    State(state): State<Arc<PanelState>>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let Some(recipient) = req.recipient() else {
        return Err(ApiError::bad_request("recipient is required"));
    };

    let amount_sat = match &req.amount {
        Some(value) => Some(parse_amount_value(value).ok_or_else(|| {
            ApiError::bad_request("amount must be a non-negative integer number of sats")
        })?),
        None => None,
    };

    if amount_sat.is_none() && !is_lightning_invoice(recipient) {
        return Err(ApiError::bad_request(
            "amount is required unless the recipient is a Lightning invoice",
        ));
    }

    let comment = req
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    tracing::info!(amount_sat, has_comment = comment.is_some(), "sending payment");
    let details = state.wallet.send(recipient, amount_sat, comment).await?;
    Ok(Json(SendResponse {
        success: true,
        message: "Payment sent successfully".to_string(),
        details: Some(details),
    }))
}

pub async fn board(
    State(state): State<Arc<PanelState>>,
    Json(req): Json<BoardRequest>,
) -> Result<Json<BoardResponse>, ApiError> {
    let amount_sat = match &req.amount {
        Some(value) => Some(parse_amount_value(value).ok_or_else(|| {
            ApiError::bad_request("amount must be a non-negative integer number of sats")
        })?),
        None => None,
    };

    tracing::info!(amount_sat, "boarding funds into the Ark");
    let details = state.wallet.board(amount_sat).await?;
    Ok(Json(BoardResponse {
        success: true,
        details,
    }))
}

pub async fn exit(
    State(state): State<Arc<PanelState>>,
    Json(req): Json<ExitRequest>,
) -> Result<Json<ExitResponse>, ApiError> {
    let target = match (req.vtxo_id.as_deref(), req.exit_all.unwrap_or(false)) {
        (Some(id), false) if !id.trim().is_empty() => ExitTarget::Vtxo(id.trim().to_string()),
        (None, true) => ExitTarget::All,
        _ => {
            return Err(ApiError::bad_request(
                "exactly one of vtxoId or exitAll is required",
            ));
        }
    };

    let invocation = state.wallet.start_exit(&target)?;
    tracing::info!(invocation = %invocation, ?target, "unilateral exit started");
    Ok(Json(ExitResponse {
        success: true,
        message: "Unilateral exit started".to_string(),
        warning: "Exits take hours to complete and cannot be cancelled; progress is only visible \
                  in the server logs"
            .to_string(),
    }))
}

pub async fn wallet_status(
    State(state): State<Arc<PanelState>>,
) -> Json<WalletStatusResponse> {
    Json(WalletStatusResponse {
        initialized: state.wallet.is_initialized(),
    })
}

pub async fn init_wallet(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<SimpleSuccessResponse>, ApiError> {
    if !state.wallet.is_initialized() {
        state.wallet.create().await?;
    }
    Ok(Json(SimpleSuccessResponse { success: true }))
}

pub async fn delete_wallet(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<SimpleSuccessResponse>, ApiError> {
    state
        .wallet
        .delete()
        .map_err(|e| ApiError::internal(format!("failed to delete wallet: {e}")))?;
    Ok(Json(SimpleSuccessResponse { success: true }))
}

pub async fn onchain_balance(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<OnchainBalanceResponse>, ApiError> {
    let balance = state.wallet.onchain_balance().await?;
    Ok(Json(OnchainBalanceResponse { balance }))
}

pub async fn onchain_address(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<OnchainAddressResponse>, ApiError> {
    let address = state.wallet.onchain_address().await?;
    Ok(Json(OnchainAddressResponse { address }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lightning_invoices_are_detected_across_networks() {
        assert!(is_lightning_invoice("lnbc2500n1p..."));
        assert!(is_lightning_invoice("LNTBS1m1p..."));
        assert!(is_lightning_invoice("lnbcrt5u1p..."));
        assert!(!is_lightning_invoice("bc1qxyz"));
        assert!(!is_lightning_invoice("02deadbeef"));
    }
}
