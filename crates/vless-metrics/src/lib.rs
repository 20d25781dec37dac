//! Metrics collection and Prometheus exporter for vless-rs.
//!
//! Connection lifecycle, rejection statuses, route choice and relayed
//! bytes are recorded through the `metrics` facade. Nothing is exported
//! unless [`init_prometheus`] installs the recorder.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of TCP connections accepted.
pub const CONNECTIONS_TOTAL: &str = "vless_connections_total";
/// Number of currently active connections.
pub const CONNECTIONS_ACTIVE: &str = "vless_connections_active";
/// Total number of connections dropped at accept (reason: "max_connections").
pub const CONNECTIONS_REFUSED_TOTAL: &str = "vless_connections_refused_total";
/// Total number of connections refused before relaying, by status code.
pub const REJECTIONS_TOTAL: &str = "vless_rejections_total";
/// Total number of handshake decode/validation failures, by kind.
pub const HANDSHAKE_FAILURES_TOTAL: &str = "vless_handshake_failures_total";
/// Total number of sessions that reached the relaying state, by route.
pub const SESSIONS_TOTAL: &str = "vless_sessions_total";
/// Total number of dials to the fallback endpoint.
pub const FALLBACK_DIALS_TOTAL: &str = "vless_fallback_dials_total";
/// Total bytes forwarded from clients to destinations.
pub const BYTES_UPLINK_TOTAL: &str = "vless_bytes_uplink_total";
/// Total bytes forwarded from destinations to clients.
pub const BYTES_DOWNLINK_TOTAL: &str = "vless_bytes_downlink_total";
/// Outbound connect duration histogram (seconds), including a fallback dial.
pub const CONNECT_DURATION_SECONDS: &str = "vless_connect_duration_seconds";
/// Connection duration histogram (seconds).
pub const CONNECTION_DURATION_SECONDS: &str = "vless_connection_duration_seconds";
/// Total number of relay sessions closed, by reason.
pub const SESSIONS_CLOSED_TOTAL: &str = "vless_sessions_closed_total";
/// Total number of errors by type.
pub const ERRORS_TOTAL: &str = "vless_errors_total";
/// TLS handshake duration histogram (seconds).
pub const TLS_HANDSHAKE_DURATION_SECONDS: &str = "vless_tls_handshake_duration_seconds";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a new connection accepted.
#[inline]
pub fn record_connection_accepted() {
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a connection closed.
#[inline]
pub fn record_connection_closed(duration_secs: f64) {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(duration_secs);
}

/// Record a connection dropped before any bytes were read.
#[inline]
pub fn record_connection_refused(reason: &'static str) {
    counter!(CONNECTIONS_REFUSED_TOTAL, "reason" => reason).increment(1);
}

/// Record a rejection answered with `status` (400, 403, 404, 426, 502).
#[inline]
pub fn record_rejection(status: u16) {
    counter!(REJECTIONS_TOTAL, "status" => status_label(status)).increment(1);
}

/// Record a handshake failure (kind: "malformed_encoding", "too_short", ...).
#[inline]
pub fn record_handshake_failure(kind: &'static str) {
    counter!(HANDSHAKE_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Record a session entering the relay (route: "direct" or "fallback").
#[inline]
pub fn record_session_started(route: &'static str) {
    counter!(SESSIONS_TOTAL, "route" => route).increment(1);
}

/// Record a dial to the fallback endpoint.
#[inline]
pub fn record_fallback_dial() {
    counter!(FALLBACK_DIALS_TOTAL).increment(1);
}

/// Record bytes forwarded client -> destination.
#[inline]
pub fn record_bytes_uplink(bytes: u64) {
    counter!(BYTES_UPLINK_TOTAL).increment(bytes);
}

/// Record bytes forwarded destination -> client.
#[inline]
pub fn record_bytes_downlink(bytes: u64) {
    counter!(BYTES_DOWNLINK_TOTAL).increment(bytes);
}

/// Record how long the establisher took.
#[inline]
pub fn record_connect_duration(duration_secs: f64) {
    histogram!(CONNECT_DURATION_SECONDS).record(duration_secs);
}

/// Record why a relay session ended.
#[inline]
pub fn record_session_closed(reason: &'static str) {
    counter!(SESSIONS_CLOSED_TOTAL, "reason" => reason).increment(1);
}

/// Record an error by type.
#[inline]
pub fn record_error(error_type: &'static str) {
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Record TLS handshake duration.
#[inline]
pub fn record_tls_handshake_duration(duration_secs: f64) {
    histogram!(TLS_HANDSHAKE_DURATION_SECONDS).record(duration_secs);
}

fn status_label(status: u16) -> &'static str {
    match status {
        400 => "400",
        403 => "403",
        404 => "404",
        426 => "426",
        502 => "502",
        _ => "other",
    }
}

// ============================================================================
// Error Type Constants (re-exported from vless-core)
// ============================================================================

pub use vless_core::{
    ERROR_AUTH, ERROR_CONFIG, ERROR_IO, ERROR_PROTOCOL, ERROR_TLS_HANDSHAKE, ERROR_UNREACHABLE,
    ERROR_UPGRADE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_share_prefix() {
        for name in [
            CONNECTIONS_TOTAL,
            REJECTIONS_TOTAL,
            HANDSHAKE_FAILURES_TOTAL,
            FALLBACK_DIALS_TOTAL,
            BYTES_UPLINK_TOTAL,
            SESSIONS_CLOSED_TOTAL,
        ] {
            assert!(name.starts_with("vless_"), "{name}");
        }
    }

    #[test]
    fn status_labels_are_bounded() {
        assert_eq!(status_label(403), "403");
        assert_eq!(status_label(502), "502");
        assert_eq!(status_label(418), "other");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_rejection(400);
        record_bytes_uplink(10);
        record_session_closed("client_closed");
    }

    #[test]
    fn invalid_listen_address() {
        assert!(init_prometheus("not-an-address").is_err());
    }
}
