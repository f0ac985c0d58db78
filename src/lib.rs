//! gatekeep gateway
//!
//! Wires the credential store, the guard chain and the bundled plugins into an HTTP
//! server in front of a search cluster.

pub mod bootstrap;
pub mod config;
pub mod plugins;
pub mod server;
pub mod upstream;

pub use bootstrap::Gateway;
pub use config::GatewayConfig;
