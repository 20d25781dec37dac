//! Configuration data types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    /// TLS termination. Plain TCP when absent (e.g. behind a reverse proxy).
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: String,
    /// Secondary destination dialed once when the requested one fails, as `host:port`.
    pub fallback: String,
    /// Upper bound for a single outbound connection attempt.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound for the HTTP upgrade request head.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Maximum concurrent connections (None = unlimited)
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// Read buffer size for the destination-to-client direction.
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// TCP listener backlog.
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    /// Socket options for accepted and outbound connections.
    #[serde(default)]
    pub tcp: TcpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) for lower latency.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The 16-byte client credential in UUID form.
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: String,
    pub key: String,
    #[serde(default)]
    pub alpn: Vec<String>,
    /// Minimum TLS version: "tls12" or "tls13".
    #[serde(default = "default_tls_min_version")]
    pub min_version: String,
    /// Maximum TLS version: "tls12" or "tls13".
    #[serde(default = "default_tls_max_version")]
    pub max_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Request path accepted for upgrades. Query strings are ignored.
    #[serde(default = "default_ws_path")]
    pub path: String,
    /// Expected `Host` header. Any host is accepted when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_ws_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            host: None,
            max_frame_bytes: default_ws_max_frame_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exporter listen address. Disabled when unset.
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"vless_server": "debug", "rustls": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[server]
listen = "0.0.0.0:8080"
fallback = "relay.example.net:443"

[auth]
uuid = "d342d11e-d424-4583-b36e-524ab1f0afa4"
"#,
        )
        .unwrap();

        assert!(cfg.tls.is_none());
        assert_eq!(cfg.server.connect_timeout_secs, 10);
        assert_eq!(cfg.server.max_header_bytes, 8192);
        assert_eq!(cfg.server.relay_buffer_size, 32768);
        assert!(cfg.server.max_connections.is_none());
        assert!(cfg.server.tcp.no_delay);
        assert_eq!(cfg.server.tcp.keepalive_secs, 300);
        assert_eq!(cfg.websocket.path, "/");
        assert!(cfg.websocket.host.is_none());
        assert!(cfg.metrics.listen.is_none());
        assert!(cfg.logging.filters.is_empty());
    }

    #[test]
    fn tls_section_defaults_versions() {
        let tls: TlsConfig = toml::from_str(
            r#"
cert = "/etc/vless/cert.pem"
key = "/etc/vless/key.pem"
alpn = ["http/1.1"]
"#,
        )
        .unwrap();
        assert_eq!(tls.min_version, "tls12");
        assert_eq!(tls.max_version, "tls13");
        assert_eq!(tls.alpn, vec!["http/1.1".to_string()]);
    }
}
