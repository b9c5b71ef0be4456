//! Request and response DTOs for the control panel API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, WalletError};
use crate::wallet::{Balance, Vtxo, parse_sat_amount};

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub total: u64,
    pub offchain_sat: u64,
    pub onchain_sat: u64,
    pub pending_exit_sat: u64,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            total: balance.total(),
            offchain_sat: balance.offchain_sat,
            onchain_sat: balance.onchain_sat,
            pending_exit_sat: balance.pending_exit_sat,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PubkeyResponse {
    pub pubkey: String,
}

#[derive(Debug, Serialize)]
pub struct VtxoEntry {
    pub id: String,
    pub amount: u64,
    #[serde(rename = "type")]
    pub vtxo_type: String,
    pub expiry: u64,
    pub near_expiry: bool,
}

impl VtxoEntry {
    pub fn new(vtxo: Vtxo, current_height: u64, threshold: u64) -> Self {
        let near_expiry = vtxo.is_near_expiry(current_height, threshold);
        Self {
            id: vtxo.id,
            amount: vtxo.amount_sat,
            vtxo_type: vtxo.vtxo_type,
            expiry: vtxo.expiry_height,
            near_expiry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VtxosResponse {
    pub current_height: u64,
    pub vtxos: Vec<VtxoEntry>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub success: bool,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct ExitResponse {
    pub success: bool,
    pub message: String,
    pub warning: String,
}

#[derive(Debug, Serialize)]
pub struct WalletStatusResponse {
    pub initialized: bool,
}

#[derive(Debug, Serialize)]
pub struct SimpleSuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct OnchainBalanceResponse {
    pub balance: u64,
}

#[derive(Debug, Serialize)]
pub struct OnchainAddressResponse {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Address, VTXO pubkey, or Lightning invoice. Older clients post
    /// `destination`, newer ones `recipient`; both are accepted.
    pub recipient: Option<String>,
    pub destination: Option<String>,
    /// Amount in sats, as a number or a string with grouping separators.
    pub amount: Option<serde_json::Value>,
    pub comment: Option<String>,
}

impl SendRequest {
    pub fn recipient(&self) -> Option<&str> {
        self.recipient
            .as_deref()
            .or(self.destination.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct BoardRequest {
    pub amount: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ExitRequest {
    #[serde(rename = "vtxoId", alias = "vtxo_id")]
    pub vtxo_id: Option<String>,
    #[serde(rename = "exitAll", alias = "exit_all")]
    pub exit_all: Option<bool>,
}

/// Normalize a JSON amount field: a non-negative number, or a string with
/// grouping separators and an optional `sat` suffix.
pub fn parse_amount_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => parse_sat_amount(s),
        _ => None,
    }
}

// --- Errors ---

/// API error: a status code plus an `{error}` JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn send_request_accepts_both_recipient_keys() {
        let req: SendRequest =
            serde_json::from_value(json!({"destination": " addr1 "})).unwrap();
        assert_eq!(req.recipient(), Some("addr1"));

        let req: SendRequest = serde_json::from_value(json!({"recipient": ""})).unwrap();
        assert_eq!(req.recipient(), None);

        let req: SendRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.recipient(), None);
    }

    #[test]
    fn amount_value_accepts_numbers_and_grouped_strings() {
        assert_eq!(parse_amount_value(&json!(5000)), Some(5000));
        assert_eq!(parse_amount_value(&json!("12,345")), Some(12_345));
        assert_eq!(parse_amount_value(&json!("1000sat")), Some(1000));
        assert_eq!(parse_amount_value(&json!(-1)), None);
        assert_eq!(parse_amount_value(&json!(true)), None);
    }

    #[test]
    fn exit_request_accepts_camel_and_snake_case() {
        let req: ExitRequest = serde_json::from_value(json!({"vtxoId": "abc:0"})).unwrap();
        assert_eq!(req.vtxo_id.as_deref(), Some("abc:0"));

        let req: ExitRequest = serde_json::from_value(json!({"exit_all": true})).unwrap();
        assert_eq!(req.exit_all, Some(true));
    }
}
