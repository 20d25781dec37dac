//! Server error types.

use tokio_tungstenite::tungstenite;
use vless_metrics::{
    ERROR_AUTH, ERROR_CONFIG, ERROR_IO, ERROR_PROTOCOL, ERROR_TLS_HANDSHAKE, ERROR_UNREACHABLE,
    ERROR_UPGRADE,
};
use vless_proto::HandshakeError;

use crate::upgrade::RejectStatus;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("tls: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("handshake: {}", .0.as_str())]
    Handshake(HandshakeError),
    #[error("upgrade rejected ({}): {reason}", .status.code())]
    Upgrade {
        status: RejectStatus,
        reason: &'static str,
    },
    #[error("destination and fallback unreachable")]
    Unreachable,
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl From<HandshakeError> for ServerError {
    fn from(err: HandshakeError) -> Self {
        ServerError::Handshake(err)
    }
}

impl From<vless_config::ConfigError> for ServerError {
    fn from(err: vless_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl ServerError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Tls(_) => ERROR_TLS_HANDSHAKE,
            ServerError::Config(_) => ERROR_CONFIG,
            ServerError::Handshake(HandshakeError::Unauthorized) => ERROR_AUTH,
            ServerError::Handshake(_) => ERROR_PROTOCOL,
            ServerError::Upgrade { .. } | ServerError::WebSocket(_) => ERROR_UPGRADE,
            ServerError::Unreachable => ERROR_UNREACHABLE,
        }
    }

    /// Status to answer the upgrade request with, if this error happened
    /// before the WebSocket was accepted.
    pub fn reject_status(&self) -> Option<RejectStatus> {
        match self {
            ServerError::Handshake(HandshakeError::Unauthorized) => Some(RejectStatus::Forbidden),
            ServerError::Handshake(_) => Some(RejectStatus::BadRequest),
            ServerError::Upgrade { status, .. } => Some(*status),
            ServerError::Unreachable => Some(RejectStatus::BadGateway),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_errors_map_to_statuses() {
        let cases = [
            (HandshakeError::MalformedEncoding, RejectStatus::BadRequest),
            (HandshakeError::TooShort, RejectStatus::BadRequest),
            (HandshakeError::InvalidAddress, RejectStatus::BadRequest),
            (HandshakeError::Unauthorized, RejectStatus::Forbidden),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).reject_status(), Some(status));
        }
    }

    #[test]
    fn unreachable_is_bad_gateway() {
        let err = ServerError::Unreachable;
        assert_eq!(err.reject_status(), Some(RejectStatus::BadGateway));
        assert_eq!(err.error_type(), ERROR_UNREACHABLE);
    }

    #[test]
    fn io_errors_are_not_answered() {
        let err = ServerError::Io(std::io::Error::other("reset"));
        assert_eq!(err.reject_status(), None);
        assert_eq!(err.error_type(), ERROR_IO);
    }
}
