//! HTTP layer: the JSON API and the embedded static client.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{PanelState, bind, router, run};
