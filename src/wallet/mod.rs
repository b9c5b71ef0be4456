//! Wallet subsystem: invoke the external CLI and interpret what it says.

pub mod gateway;
pub mod interpret;
pub mod model;
pub mod ops;

pub use gateway::{RawResult, WALLET_BIN_NAME, WalletCli};
pub use interpret::{ExpectedShape, FieldSet, Outcome, interpret, parse_sat_amount};
pub use model::{Balance, Vtxo};
pub use ops::{ExitTarget, Wallet};
