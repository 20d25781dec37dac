//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::defaults::{default_tls_max_version, default_tls_min_version};
use crate::types::TlsConfig;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override server listen address, e.g. 0.0.0.0:443
    #[arg(long)]
    pub listen: Option<String>,
    /// Override fallback endpoint, e.g. relay.example.net:443
    #[arg(long)]
    pub fallback: Option<String>,
    /// Override client credential (UUID)
    #[arg(long)]
    pub uuid: Option<String>,
    /// Override TLS cert path
    #[arg(long)]
    pub tls_cert: Option<String>,
    /// Override TLS key path
    #[arg(long)]
    pub tls_key: Option<String>,
    /// Override ALPN list (repeatable or comma-separated)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub alpn: Option<Vec<String>>,
    /// Override outbound connect timeout (seconds)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Override maximum upgrade request head bytes
    #[arg(long)]
    pub max_header_bytes: Option<usize>,
    /// Override maximum concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,
    /// Buffer size for the destination-to-client relay (bytes)
    #[arg(long)]
    pub relay_buffer_size: Option<usize>,
    /// TCP listener backlog size
    #[arg(long)]
    pub connection_backlog: Option<u32>,
    /// WebSocket path
    #[arg(long)]
    pub ws_path: Option<String>,
    /// WebSocket host (optional)
    #[arg(long)]
    pub ws_host: Option<String>,
    /// WebSocket max frame bytes
    #[arg(long)]
    pub ws_max_frame_bytes: Option<usize>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Disable TCP_NODELAY (enable Nagle's algorithm)
    #[arg(long)]
    pub tcp_no_delay: Option<bool>,
    /// TCP Keep-Alive interval in seconds (0 = disabled)
    #[arg(long)]
    pub tcp_keepalive_secs: Option<u64>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    }
    if let Some(v) = &overrides.fallback {
        config.server.fallback = v.clone();
    }
    if let Some(v) = &overrides.uuid {
        config.auth.uuid = v.clone();
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.server.connect_timeout_secs = v;
    }
    if let Some(v) = overrides.max_header_bytes {
        config.server.max_header_bytes = v;
    }
    if let Some(v) = overrides.max_connections {
        config.server.max_connections = Some(v);
    }
    if let Some(v) = overrides.relay_buffer_size {
        config.server.relay_buffer_size = v;
    }
    if let Some(v) = overrides.connection_backlog {
        config.server.connection_backlog = v;
    }
    if let Some(v) = overrides.tcp_no_delay {
        config.server.tcp.no_delay = v;
    }
    if let Some(v) = overrides.tcp_keepalive_secs {
        config.server.tcp.keepalive_secs = v;
    }

    // A cert and key on the command line enable TLS even without a [tls] section.
    if let (Some(cert), Some(key), None) = (&overrides.tls_cert, &overrides.tls_key, &config.tls) {
        config.tls = Some(TlsConfig {
            cert: cert.clone(),
            key: key.clone(),
            alpn: Vec::new(),
            min_version: default_tls_min_version(),
            max_version: default_tls_max_version(),
        });
    }
    if let Some(tls) = config.tls.as_mut() {
        if let Some(v) = &overrides.tls_cert {
            tls.cert = v.clone();
        }
        if let Some(v) = &overrides.tls_key {
            tls.key = v.clone();
        }
        if let Some(v) = &overrides.alpn {
            tls.alpn = v.clone();
        }
    }

    if let Some(v) = &overrides.ws_path {
        config.websocket.path = v.clone();
    }
    if let Some(v) = &overrides.ws_host {
        config.websocket.host = Some(v.clone());
    }
    if let Some(v) = overrides.ws_max_frame_bytes {
        config.websocket.max_frame_bytes = v;
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
