//! Domain model for wallet state as observed through the CLI.
//!
//! This system never creates or destroys a VTXO itself; it only displays
//! the set the wallet binary reports.

use serde::Serialize;
use serde_json::Value;

use super::interpret::parse_sat_amount;

/// Wallet balance in satoshis. The total is always recomputed, never
/// stored, so it can never drift from its parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub offchain_sat: u64,
    pub onchain_sat: u64,
    pub pending_exit_sat: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.offchain_sat + self.onchain_sat + self.pending_exit_sat
    }

    /// Build a balance from the wallet's JSON output.
    ///
    /// Amounts may arrive as JSON numbers or as strings with grouping
    /// separators; absent optional fields default to 0. An object with
    /// none of the known fields yields `None` so callers surface a parse
    /// error instead of a silent zero balance.
    pub fn from_json(value: &Value) -> Option<Self> {
        let offchain = sat_field(value, &["offchain_sat", "offchain", "spendable_sat"]);
        let onchain = sat_field(value, &["onchain_sat", "onchain"]);
        let pending = sat_field(value, &["pending_exit_sat", "pending_exit", "pending_in_exit"]);

        if offchain.is_none() && onchain.is_none() && pending.is_none() {
            return None;
        }

        Some(Self {
            offchain_sat: offchain.unwrap_or(0),
            onchain_sat: onchain.unwrap_or(0),
            pending_exit_sat: pending.unwrap_or(0),
        })
    }
}

/// A virtual transaction output tracked by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vtxo {
    pub id: String,
    pub amount_sat: u64,
    /// `board`, `round`, `exit`, ... — open set, preserved verbatim so
    /// unknown types still display.
    pub vtxo_type: String,
    pub expiry_height: u64,
}

impl Vtxo {
    /// Build a VTXO from one element of the wallet's JSON array output.
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = string_field(value, &["id", "outpoint", "utxo"])?;
        let amount_sat = sat_field(value, &["amount_sat", "amount"])?;
        let vtxo_type = string_field(value, &["vtxo_type", "type"])
            .unwrap_or_else(|| "unknown".to_string());
        let expiry_height = sat_field(value, &["expiry_height", "expiry"])?;

        Some(Self {
            id,
            amount_sat,
            vtxo_type,
            expiry_height,
        })
    }

    /// Whether this VTXO is close enough to expiry to need a refresh.
    ///
    /// A margin of exactly `threshold` blocks is not near-expiry. A
    /// current height of 0 means "unknown" and never flags anything.
    pub fn is_near_expiry(&self, current_height: u64, threshold: u64) -> bool {
        if current_height == 0 {
            return false;
        }
        self.expiry_height.saturating_sub(current_height) < threshold
    }
}

fn sat_field(value: &Value, keys: &[&str]) -> Option<u64> {
    for key in keys {
        match value.get(key) {
            Some(Value::Number(n)) => return n.as_u64(),
            Some(Value::String(s)) => return parse_sat_amount(s),
            _ => {}
        }
    }
    None
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn total_is_the_sum_of_its_parts() {
        let balance = Balance {
            offchain_sat: 1000,
            onchain_sat: 250,
            pending_exit_sat: 50,
        };
        assert_eq!(balance.total(), 1300);
    }

    #[test]
    fn absent_pending_exit_defaults_to_zero() {
        let balance =
            Balance::from_json(&json!({"offchain_sat": 700, "onchain_sat": 30})).unwrap();
        assert_eq!(balance.pending_exit_sat, 0);
        assert_eq!(balance.total(), 730);
    }

    #[test]
    fn string_amounts_with_separators_parse() {
        let balance = Balance::from_json(&json!({
            "offchain_sat": "12,345",
            "onchain_sat": 0,
        }))
        .unwrap();
        assert_eq!(balance.offchain_sat, 12_345);
    }

    #[test]
    fn unrelated_object_is_not_a_balance() {
        assert_eq!(Balance::from_json(&json!({"status": "ok"})), None);
    }

    #[test]
    fn near_expiry_boundary_is_strict() {
        let vtxo = Vtxo {
            id: "abc:0".to_string(),
            amount_sat: 5000,
            vtxo_type: "round".to_string(),
            expiry_height: 1100,
        };
        // margin 100 == threshold: not near-expiry
        assert!(!vtxo.is_near_expiry(1000, 100));
        // margin 99 < threshold: near-expiry
        assert!(vtxo.is_near_expiry(1001, 100));
        // already expired
        assert!(vtxo.is_near_expiry(1200, 100));
    }

    #[test]
    fn unknown_height_never_flags_expiry() {
        let vtxo = Vtxo {
            id: "abc:0".to_string(),
            amount_sat: 5000,
            vtxo_type: "board".to_string(),
            expiry_height: 10,
        };
        assert!(!vtxo.is_near_expiry(0, 100));
    }

    #[test]
    fn vtxo_accepts_alias_keys() {
        let vtxo = Vtxo::from_json(&json!({
            "id": "deadbeef:1",
            "amount": "2,000",
            "type": "board",
            "expiry": 150_000,
        }))
        .unwrap();
        assert_eq!(vtxo.amount_sat, 2000);
        assert_eq!(vtxo.vtxo_type, "board");
        assert_eq!(vtxo.expiry_height, 150_000);
    }
}
