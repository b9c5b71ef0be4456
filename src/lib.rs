//! arkdeck — browser control panel for the bark Ark wallet CLI.
//!
//! The server shells out to the external `bark` binary for every wallet
//! operation, interprets its semi-structured output, and exposes a JSON
//! HTTP API plus an embedded single-page client.
//!
//! Two components do the real work:
//!
//! - [`wallet::gateway`] invokes the binary: executable discovery,
//!   discrete argument assembly, timeouts, detached long-running
//!   invocations. A non-zero exit is data, not an error.
//! - [`wallet::interpret`] turns raw output into an outcome: embedded
//!   JSON extraction, tolerant field scraping, and the success-evidence
//!   rule that stops real successes from being reported as failures just
//!   because the binary exited non-zero.

pub mod config;
pub mod error;
pub mod wallet;
pub mod web;

pub use error::{Error, Result};
