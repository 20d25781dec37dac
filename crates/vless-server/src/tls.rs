//! TLS configuration loading.

use std::sync::Arc;

use tokio_rustls::rustls;
use tracing::info;
use vless_config::TlsConfig;

use crate::error::ServerError;

/// Build a rustls server config from certificate and key files.
pub fn load_tls_config(cfg: &TlsConfig) -> Result<rustls::ServerConfig, ServerError> {
    let certs = load_certs(&cfg.cert)?;
    if certs.is_empty() {
        return Err(ServerError::Config(format!("no certificates in {}", cfg.cert)));
    }
    let key = load_private_key(&cfg.key)?;

    let versions: &[&'static rustls::SupportedProtocolVersion] =
        match (cfg.min_version.as_str(), cfg.max_version.as_str()) {
            ("tls13", "tls13") => &[&rustls::version::TLS13],
            ("tls12", "tls12") => &[&rustls::version::TLS12],
            _ => &[&rustls::version::TLS12, &rustls::version::TLS13],
        };

    let provider = rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)
        .map_err(|e| ServerError::Config(format!("TLS version error: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    if !cfg.alpn.is_empty() {
        config.alpn_protocols = cfg.alpn.iter().map(|s| s.as_bytes().to_vec()).collect();
    }

    info!(
        min_version = %cfg.min_version,
        max_version = %cfg.max_version,
        alpn = ?cfg.alpn,
        "TLS configured"
    );

    Ok(config)
}

/// Load certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, ServerError> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    Ok(certs)
}

/// Load the first private key from a PEM file.
fn load_private_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>, ServerError> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| ServerError::Config(format!("no private key found in {path}")))
}
