//! Server state shared across connections.

use std::fmt;

use vless_config::{Config, WebSocketConfig, parse_host_port};
use vless_proto::Credential;

use crate::error::ServerError;

/// A `host:port` pair dialed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Immutable per-process settings handed to every session.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub credential: Credential,
    pub fallback: Endpoint,
    pub max_header_bytes: usize,
    pub relay_buffer_size: usize,
    pub websocket: WebSocketConfig,
}

impl ServerState {
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let credential = config
            .auth
            .uuid
            .parse::<Credential>()
            .map_err(|e| ServerError::Config(format!("auth.uuid: {e}")))?;
        let (host, port) = parse_host_port(&config.server.fallback)?;
        Ok(Self {
            credential,
            fallback: Endpoint::new(host, port),
            max_header_bytes: config.server.max_header_bytes,
            relay_buffer_size: config.server.relay_buffer_size,
            websocket: config.websocket.clone(),
        })
    }
}
