//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// TLS handshake error.
pub const ERROR_TLS_HANDSHAKE: &str = "tls_handshake";
/// WebSocket upgrade negotiation error.
pub const ERROR_UPGRADE: &str = "upgrade";
/// Handshake decoding/validation error.
pub const ERROR_PROTOCOL: &str = "protocol";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// Destination (and fallback) unreachable.
pub const ERROR_UNREACHABLE: &str = "unreachable";
/// Authentication error.
pub const ERROR_AUTH: &str = "auth";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
