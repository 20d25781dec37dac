//! # vless-rs
//!
//! A VLESS-over-WebSocket tunneling relay.
//!
//! ## Crates
//!
//! - [`vless_core`] - Defaults, error labels and the session relay engine
//! - [`vless_proto`] - Handshake decoding, address resolution, token codec
//! - [`vless_config`] - Configuration loading and validation
//! - [`vless_metrics`] - Prometheus-compatible metrics
//! - [`vless_server`] - Server implementation

pub use vless_config as config;
pub use vless_core as core;
pub use vless_metrics as metrics;
pub use vless_proto as proto;
pub use vless_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use vless_config::{Config, load_config, validate_config};
    pub use vless_proto::{Credential, decode_request, decode_token};
    pub use vless_server::{CancellationToken, ServerError, run, run_with_shutdown};
}
