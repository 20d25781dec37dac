//! Configuration validation logic.

use std::net::SocketAddr;

use vless_proto::Credential;

use crate::Config;
use crate::defaults::min_header_bytes;
use crate::endpoint::parse_host_port;
use crate::loader::ConfigError;

const TLS_VERSIONS: [&str; 2] = ["tls12", "tls13"];

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "server.listen is not a socket address: '{}'",
            config.server.listen
        )));
    }
    parse_host_port(&config.server.fallback)?;
    if config.auth.uuid.parse::<Credential>().is_err() {
        return Err(ConfigError::Validation(
            "auth.uuid must be a UUID or 32 hex digits".into(),
        ));
    }
    if config.server.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.max_header_bytes < min_header_bytes() {
        return Err(ConfigError::Validation(format!(
            "server.max_header_bytes too small (min {})",
            min_header_bytes()
        )));
    }
    if config.server.max_connections == Some(0) {
        return Err(ConfigError::Validation(
            "server.max_connections must be > 0 when set".into(),
        ));
    }
    if config.server.relay_buffer_size < 1024 {
        return Err(ConfigError::Validation(
            "server.relay_buffer_size must be >= 1024".into(),
        ));
    }
    if config.server.relay_buffer_size > 1024 * 1024 {
        return Err(ConfigError::Validation(
            "server.relay_buffer_size must be <= 1MB".into(),
        ));
    }
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if let Some(tls) = &config.tls {
        if tls.cert.trim().is_empty() {
            return Err(ConfigError::Validation("tls.cert is empty".into()));
        }
        if tls.key.trim().is_empty() {
            return Err(ConfigError::Validation("tls.key is empty".into()));
        }
        if !TLS_VERSIONS.contains(&tls.min_version.as_str()) {
            return Err(ConfigError::Validation(format!(
                "tls.min_version must be one of: {TLS_VERSIONS:?}"
            )));
        }
        if !TLS_VERSIONS.contains(&tls.max_version.as_str()) {
            return Err(ConfigError::Validation(format!(
                "tls.max_version must be one of: {TLS_VERSIONS:?}"
            )));
        }
        if tls.min_version == "tls13" && tls.max_version == "tls12" {
            return Err(ConfigError::Validation(
                "tls.min_version cannot be greater than tls.max_version".into(),
            ));
        }
    }
    if !config.websocket.path.starts_with('/') {
        return Err(ConfigError::Validation(
            "websocket.path must start with '/'".into(),
        ));
    }
    if config.websocket.host.as_deref().is_some_and(|h| h.trim().is_empty()) {
        return Err(ConfigError::Validation("websocket.host is empty".into()));
    }
    if config.websocket.max_frame_bytes == 0 {
        return Err(ConfigError::Validation(
            "websocket.max_frame_bytes must be > 0".into(),
        ));
    }
    if let Some(listen) = &config.metrics.listen
        && listen.parse::<SocketAddr>().is_err()
    {
        return Err(ConfigError::Validation(format!(
            "metrics.listen is not a socket address: '{listen}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn base() -> Config {
        toml::from_str(
            r#"
[server]
listen = "127.0.0.1:8080"
fallback = "relay.example.net:443"

[auth]
uuid = "d342d11e-d424-4583-b36e-524ab1f0afa4"
"#,
        )
        .unwrap()
    }

    fn rejected(cfg: &Config, needle: &str) {
        match validate_config(cfg) {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn base_config_is_valid() {
        validate_config(&base()).unwrap();
    }

    #[test]
    fn bad_credential() {
        let mut cfg = base();
        cfg.auth.uuid = "not-a-uuid".into();
        rejected(&cfg, "auth.uuid");
    }

    #[test]
    fn bad_fallback() {
        let mut cfg = base();
        cfg.server.fallback = "relay.example.net".into();
        rejected(&cfg, "invalid endpoint");
    }

    #[test]
    fn bad_listen_and_timeouts() {
        let mut cfg = base();
        cfg.server.listen = "localhost".into();
        rejected(&cfg, "server.listen");

        let mut cfg = base();
        cfg.server.connect_timeout_secs = 0;
        rejected(&cfg, "connect_timeout_secs");

        let mut cfg = base();
        cfg.server.max_header_bytes = 16;
        rejected(&cfg, "max_header_bytes");
    }

    #[test]
    fn websocket_path_must_be_absolute() {
        let mut cfg = base();
        cfg.websocket.path = "tunnel".into();
        rejected(&cfg, "websocket.path");
    }

    #[test]
    fn tls_version_order() {
        let mut cfg = base();
        cfg.tls = Some(TlsConfig {
            cert: "cert.pem".into(),
            key: "key.pem".into(),
            alpn: Vec::new(),
            min_version: "tls13".into(),
            max_version: "tls12".into(),
        });
        rejected(&cfg, "min_version");

        if let Some(tls) = cfg.tls.as_mut() {
            tls.min_version = "ssl3".into();
        }
        rejected(&cfg, "one of");
    }
}
