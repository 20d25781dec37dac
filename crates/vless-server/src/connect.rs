//! Outbound connection establishment.
//!
//! A request gets one direct attempt and, if that fails for any reason,
//! exactly one attempt to the configured fallback endpoint. There is no
//! retry loop and no backoff.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, warn};
use vless_config::TcpConfig;
use vless_metrics::record_fallback_dial;

use crate::error::ServerError;
use crate::state::Endpoint;

/// One outbound connection attempt.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a connection to `host:port`. A single call is a single attempt.
    async fn dial(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Dials with the system resolver, bounded by a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
    tcp: TcpConfig,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration, tcp: TcpConfig) -> Self {
        Self {
            connect_timeout,
            tcp,
        }
    }

    async fn connect_any(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in lookup_host((host, port)).await? {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!(addr = %addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {host}"))
        }))
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.connect_timeout, self.connect_any(host, port))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        apply_tcp_options(&stream, &self.tcp)?;
        Ok(stream)
    }
}

/// Apply `TCP_NODELAY` and keep-alive to a connected socket.
pub(crate) fn apply_tcp_options(stream: &TcpStream, tcp: &TcpConfig) -> io::Result<()> {
    stream.set_nodelay(tcp.no_delay)?;
    if tcp.keepalive_secs > 0 {
        let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(tcp.keepalive_secs));
        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    }
    Ok(())
}

/// Which attempt produced the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Fallback,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Direct => "direct",
            Route::Fallback => "fallback",
        }
    }
}

/// An open outbound connection and the route that produced it.
#[derive(Debug)]
pub struct Established<S> {
    pub stream: S,
    pub route: Route,
}

/// Connect to `host:port`, falling back to `fallback` once.
///
/// Fails with [`ServerError::Unreachable`] when both attempts fail.
pub async fn establish<D>(
    dialer: &D,
    host: &str,
    port: u16,
    fallback: &Endpoint,
) -> Result<Established<D::Stream>, ServerError>
where
    D: Dialer + ?Sized,
{
    let direct_err = match dialer.dial(host, port).await {
        Ok(stream) => {
            return Ok(Established {
                stream,
                route: Route::Direct,
            });
        }
        Err(err) => err,
    };
    debug!(host, port, error = %direct_err, fallback = %fallback, "direct connect failed, trying fallback");
    record_fallback_dial();

    match dialer.dial(&fallback.host, fallback.port).await {
        Ok(stream) => Ok(Established {
            stream,
            route: Route::Fallback,
        }),
        Err(err) => {
            warn!(host, port, fallback = %fallback, direct_error = %direct_err, error = %err, "destination unreachable");
            Err(ServerError::Unreachable)
        }
    }
}
