//! Per-connection flow: inspect the upgrade, decode the handshake, connect,
//! accept the WebSocket and relay.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use vless_core::io::{RelaySession, relay_session};
use vless_metrics::{
    record_connect_duration, record_handshake_failure, record_rejection, record_session_closed,
    record_session_started,
};
use vless_proto::{decode_request, decode_token};

use crate::connect::{Dialer, establish};
use crate::error::ServerError;
use crate::relay::SessionMetrics;
use crate::state::{Endpoint, ServerState};
use crate::upgrade::{INITIAL_BUFFER_SIZE, Inspect, RejectStatus, accept_ws, inspect_request, send_reject};

/// Handle one accepted connection (after TLS, if any).
#[instrument(level = "debug", skip_all, fields(peer = %peer))]
pub async fn handle_conn<S, D>(
    mut stream: S,
    state: Arc<ServerState>,
    dialer: Arc<D>,
    peer: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    D: Dialer + ?Sized,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
    let request = loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("shutdown before the request head completed");
                return Ok(());
            }
            n = stream.read_buf(&mut buf) => n?,
        };
        if n == 0 {
            debug!("client closed before sending a request head");
            return Ok(());
        }
        match inspect_request(&buf, &state.websocket) {
            Inspect::NeedMore => {
                if buf.len() >= state.max_header_bytes {
                    warn!(bytes = buf.len(), max = state.max_header_bytes, "request head too large");
                    return reject(&mut stream, RejectStatus::BadRequest, "request head too large").await;
                }
            }
            Inspect::Reject(status, reason) => {
                return reject(&mut stream, status, reason).await;
            }
            Inspect::Upgrade(request) => break request,
        }
    };

    // The token outlives the session: the trailing payload borrows from it.
    let blob = match decode_token(&request.token) {
        Ok(blob) => blob,
        Err(err) => return reject_handshake(&mut stream, err.into()).await,
    };
    let req = match decode_request(&blob, &state.credential) {
        Ok(req) => req,
        Err(err) => return reject_handshake(&mut stream, err.into()).await,
    };
    let target = Endpoint::new(req.address.host.as_str(), req.header.port);
    debug!(
        version = req.header.version,
        command = ?req.header.command,
        target = %target,
        payload = req.payload.len(),
        "handshake accepted"
    );

    let connect_start = Instant::now();
    let established = establish(dialer.as_ref(), &target.host, target.port, &state.fallback).await;
    record_connect_duration(connect_start.elapsed().as_secs_f64());
    let established = match established {
        Ok(est) => est,
        Err(err) => {
            warn!(target = %target, "no route to destination");
            return reject_error(&mut stream, err).await;
        }
    };
    let route = established.route;

    let ws = accept_ws(stream, buf.freeze(), &state.websocket, &request.token).await?;
    record_session_started(route.as_str());
    debug!(target = %target, route = route.as_str(), "relaying");

    let session = RelaySession::new(&shutdown);
    let reason = relay_session(
        &session,
        ws,
        established.stream,
        req.payload,
        state.relay_buffer_size,
        &SessionMetrics,
    )
    .await;
    record_session_closed(reason.as_str());
    debug!(target = %target, route = route.as_str(), reason = reason.as_str(), "session closed");
    Ok(())
}

async fn reject<S>(stream: &mut S, status: RejectStatus, reason: &'static str) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    reject_error(stream, ServerError::Upgrade { status, reason }).await
}

async fn reject_handshake<S>(stream: &mut S, err: ServerError) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    if let ServerError::Handshake(kind) = &err {
        record_handshake_failure(kind.as_str());
    }
    reject_error(stream, err).await
}

/// Answer a pre-upgrade failure with its status and close the connection.
async fn reject_error<S>(stream: &mut S, err: ServerError) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let Some(status) = err.reject_status() else {
        return Err(err);
    };
    debug!(status = status.code(), error = %err, "request rejected");
    record_rejection(status.code());
    send_reject(stream, status).await
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::BytesMut;
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use vless_config::WebSocketConfig;
    use vless_proto::{Command, Credential, HostRef, encode_token, write_handshake};

    use super::*;

    const UUID: &str = "d342d11e-d424-4583-b36e-524ab1f0afa4";

    /// Hands out pre-made destination streams and records the attempts.
    struct PipeDialer {
        destinations: Mutex<Vec<DuplexStream>>,
        attempts: Mutex<Vec<(String, u16)>>,
    }

    impl PipeDialer {
        fn new(destinations: Vec<DuplexStream>) -> Self {
            Self {
                destinations: Mutex::new(destinations),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Dialer for PipeDialer {
        type Stream = DuplexStream;

        async fn dial(&self, host: &str, port: u16) -> io::Result<DuplexStream> {
            self.attempts.lock().unwrap().push((host.to_string(), port));
            if host.is_empty() {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty host"));
            }
            self.destinations
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    fn state() -> Arc<ServerState> {
        Arc::new(ServerState {
            credential: UUID.parse().unwrap(),
            fallback: Endpoint::new("relay.example.net", 443),
            max_header_bytes: 1024,
            relay_buffer_size: 4096,
            websocket: WebSocketConfig::default(),
        })
    }

    fn token_for(credential: &Credential, port: u16) -> String {
        let mut blob = BytesMut::new();
        write_handshake(
            &mut blob,
            credential,
            &[],
            Command::Tcp,
            port,
            &HostRef::Domain(b"example.com"),
        )
        .unwrap();
        encode_token(&blob)
    }

    fn head(token: Option<&str>) -> String {
        let protocol = token
            .map(|t| format!("Sec-WebSocket-Protocol: {t}\r\n"))
            .unwrap_or_default();
        format!(
            "GET / HTTP/1.1\r\nHost: edge\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n{protocol}\r\n"
        )
    }

    /// Drive `handle_conn` with `request` and return the raw response.
    async fn respond(request: String, dialer: Arc<PipeDialer>) -> String {
        let (mut client, server) = duplex(4096);
        let task = tokio::spawn(handle_conn(
            server,
            state(),
            dialer,
            "127.0.0.1:50000".parse().unwrap(),
            CancellationToken::new(),
        ));
        client.write_all(request.as_bytes()).await.unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        task.await.unwrap().unwrap();
        out
    }

    #[tokio::test]
    async fn wrong_credential_is_forbidden_without_dialing() {
        let other: Credential = "00000000-0000-0000-0000-000000000001".parse().unwrap();
        let dialer = Arc::new(PipeDialer::new(vec![duplex(64).0]));
        let out = respond(head(Some(&token_for(&other, 80))), dialer.clone()).await;
        assert!(out.starts_with("HTTP/1.1 403 "), "{out}");
        assert!(dialer.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_or_missing_token_is_bad_request() {
        let dialer = Arc::new(PipeDialer::new(Vec::new()));
        let out = respond(head(Some("not*base64")), dialer.clone()).await;
        assert!(out.starts_with("HTTP/1.1 400 "), "{out}");

        let out = respond(head(None), dialer).await;
        assert!(out.starts_with("HTTP/1.1 400 "), "{out}");
    }

    #[tokio::test]
    async fn both_attempts_failing_is_bad_gateway() {
        let dialer = Arc::new(PipeDialer::new(Vec::new()));
        let out = respond(head(Some(&token_for(&state().credential, 80))), dialer.clone()).await;
        assert!(out.starts_with("HTTP/1.1 502 "), "{out}");
        assert_eq!(
            *dialer.attempts.lock().unwrap(),
            vec![
                ("example.com".to_string(), 80),
                ("relay.example.net".to_string(), 443)
            ]
        );
    }

    #[tokio::test]
    async fn oversized_head_is_bad_request() {
        let dialer = Arc::new(PipeDialer::new(Vec::new()));
        let request = format!("GET / HTTP/1.1\r\nX-Pad: {}\r\n", "a".repeat(2048));
        let (mut client, server) = duplex(8192);
        let task = tokio::spawn(handle_conn(
            server,
            state(),
            dialer,
            "127.0.0.1:50000".parse().unwrap(),
            CancellationToken::new(),
        ));
        client.write_all(request.as_bytes()).await.unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        task.await.unwrap().unwrap();
        assert!(out.starts_with("HTTP/1.1 400 "), "{out}");
    }

    #[tokio::test]
    async fn empty_domain_falls_back_and_upgrades() {
        // version, credential, no addons, TCP, port 80, domain of length 0, payload
        let mut blob = vec![0u8];
        blob.extend_from_slice(state().credential.as_bytes());
        blob.extend_from_slice(&[0, 0x01, 0x00, 0x50, 0x02, 0x00]);
        blob.extend_from_slice(b"ping");
        let token = encode_token(&blob);

        let (mut fallback_side, fallback_dest) = duplex(4096);
        let dialer = Arc::new(PipeDialer::new(vec![fallback_dest]));
        let (client_io, server) = duplex(8192);
        let task = tokio::spawn(handle_conn(
            server,
            state(),
            dialer.clone(),
            "127.0.0.1:50000".parse().unwrap(),
            CancellationToken::new(),
        ));

        let mut request = "ws://edge/".into_client_request().unwrap();
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_str(&token).unwrap());
        let (mut ws, response) = tokio_tungstenite::client_async(request, client_io)
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 101);

        // The empty host fails to dial; the fallback serves the session.
        assert_eq!(
            *dialer.attempts.lock().unwrap(),
            vec![(String::new(), 80), ("relay.example.net".to_string(), 443)]
        );
        let mut payload = [0u8; 4];
        fallback_side.read_exact(&mut payload).await.unwrap();
        assert_eq!(&payload, b"ping");

        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
        drop(fallback_side);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_releases_idle_connection() {
        let dialer = Arc::new(PipeDialer::new(Vec::new()));
        let (_client, server) = duplex(4096);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(handle_conn(
            server,
            state(),
            dialer,
            "127.0.0.1:50000".parse().unwrap(),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("handler ignored shutdown")
            .unwrap()
            .unwrap();
    }
}
