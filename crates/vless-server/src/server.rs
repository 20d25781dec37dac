//! Main server loop and connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vless_config::Config;
use vless_core::defaults;
use vless_metrics::{
    ERROR_TLS_HANDSHAKE, record_connection_accepted, record_connection_closed,
    record_connection_refused, record_error, record_tls_handshake_duration,
};

use crate::connect::{TcpDialer, apply_tcp_options};
use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::state::ServerState;
use crate::tls::load_tls_config;
use crate::util::{ConnectionTracker, create_listener};

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration =
    Duration::from_secs(defaults::DEFAULT_SHUTDOWN_TIMEOUT_SECS);

/// Run the server until `shutdown` is cancelled, then drain live sessions.
///
/// Cancelling `shutdown` also stops every relaying session.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let acceptor = match &config.tls {
        Some(tls) => Some(TlsAcceptor::from(Arc::new(load_tls_config(tls)?))),
        None => {
            info!("TLS disabled, serving plain WebSocket");
            None
        }
    };

    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Config("invalid listen address".into()))?;

    let state = Arc::new(ServerState::from_config(&config)?);
    let dialer = Arc::new(TcpDialer::new(
        Duration::from_secs(config.server.connect_timeout_secs),
        config.server.tcp.clone(),
    ));
    let tcp_config = config.server.tcp.clone();
    let tracker = ConnectionTracker::new();

    // Connection limiter (None = unlimited)
    let conn_limit: Option<Arc<Semaphore>> = config.server.max_connections.map(|n| {
        info!("max_connections set to {}", n);
        Arc::new(Semaphore::new(n))
    });

    let listener = create_listener(listen, config.server.connection_backlog)?;
    info!(
        address = %listen,
        backlog = config.server.connection_backlog,
        path = %state.websocket.path,
        fallback = %state.fallback,
        "listening"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept() => {
                let (tcp, peer) = match result {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };

                let permit: Option<OwnedSemaphorePermit> = match &conn_limit {
                    Some(sem) => match sem.clone().try_acquire_owned() {
                        Ok(p) => Some(p),
                        Err(_) => {
                            debug!(peer = %peer, reason = "max_connections", "connection refused");
                            record_connection_refused("max_connections");
                            drop(tcp);
                            continue;
                        }
                    },
                    None => None,
                };

                if let Err(err) = apply_tcp_options(&tcp, &tcp_config) {
                    debug!(peer = %peer, error = %err, "failed to set socket options");
                }
                debug!(peer = %peer, "new connection");

                let acceptor = acceptor.clone();
                let state = state.clone();
                let dialer = dialer.clone();
                let shutdown = shutdown.clone();
                let guard = tracker.track();

                tokio::spawn(async move {
                    let _guard = guard;
                    let _permit = permit;
                    record_connection_accepted();
                    let start = Instant::now();

                    let result = serve_conn(tcp, acceptor, state, dialer, peer, shutdown).await;

                    let duration_secs = start.elapsed().as_secs_f64();
                    record_connection_closed(duration_secs);

                    if let Err(ref err) = result {
                        record_error(err.error_type());
                        warn!(peer = %peer, duration_secs, error = %err, "connection closed with error");
                    } else {
                        debug!(peer = %peer, duration_secs, "connection closed");
                    }
                });
            }
        }
    }

    // Graceful drain: sessions were cancelled with the same token.
    let active = tracker.count();
    if active > 0 {
        info!("waiting for {} active connections to drain", active);
        if tracker.wait_for_zero(DEFAULT_SHUTDOWN_TIMEOUT).await {
            info!("all connections drained");
        } else {
            warn!(
                "shutdown timeout, {} connections still active",
                tracker.count()
            );
        }
    }

    info!("server stopped");
    Ok(())
}

/// Terminate TLS when configured, then hand the stream to the session handler.
async fn serve_conn(
    tcp: TcpStream,
    acceptor: Option<TlsAcceptor>,
    state: Arc<ServerState>,
    dialer: Arc<TcpDialer>,
    peer: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let Some(acceptor) = acceptor else {
        return handle_conn(tcp, state, dialer, peer, shutdown).await;
    };

    let tls_start = Instant::now();
    let tls_timeout = Duration::from_secs(defaults::DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS);
    match tokio::time::timeout(tls_timeout, acceptor.accept(tcp)).await {
        Ok(Ok(tls)) => {
            let tls_duration = tls_start.elapsed().as_secs_f64();
            record_tls_handshake_duration(tls_duration);
            debug!(peer = %peer, duration_ms = tls_duration * 1000.0, "TLS handshake completed");
            handle_conn(tls, state, dialer, peer, shutdown).await
        }
        Ok(Err(err)) => {
            record_error(ERROR_TLS_HANDSHAKE);
            warn!(peer = %peer, error = %err, "TLS handshake failed");
            Ok(())
        }
        Err(_) => {
            record_error(ERROR_TLS_HANDSHAKE);
            warn!(peer = %peer, timeout_secs = tls_timeout.as_secs(), "TLS handshake timed out");
            Ok(())
        }
    }
}

/// Run the server without an external shutdown source.
pub async fn run(config: Config) -> Result<(), ServerError> {
    run_with_shutdown(config, CancellationToken::new()).await
}
