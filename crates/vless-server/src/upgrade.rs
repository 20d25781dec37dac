//! HTTP upgrade inspection, rejection responses and WebSocket acceptance.
//!
//! The request head is read and classified here before any protocol work
//! happens, so a request can still be answered with a plain status line.
//! Once the session is ready the buffered head is replayed into the
//! WebSocket acceptor.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{Request, Response},
        http::{HeaderValue, header::SEC_WEBSOCKET_PROTOCOL},
        protocol::WebSocketConfig,
    },
};
use tracing::debug;
use vless_config::WebSocketConfig as WsCfg;
use vless_core::io::PrefixedStream;

use crate::error::ServerError;

/// Initial buffer size for reading the upgrade request head.
pub const INITIAL_BUFFER_SIZE: usize = 2048;

const HTTP_HEADER_END: &[u8] = b"\r\n\r\n";

/// Status codes used to refuse a request before the upgrade completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectStatus {
    BadRequest,
    Forbidden,
    NotFound,
    UpgradeRequired,
    BadGateway,
}

impl RejectStatus {
    pub fn code(self) -> u16 {
        match self {
            RejectStatus::BadRequest => 400,
            RejectStatus::Forbidden => 403,
            RejectStatus::NotFound => 404,
            RejectStatus::UpgradeRequired => 426,
            RejectStatus::BadGateway => 502,
        }
    }

    pub fn reason_phrase(self) -> &'static str {
        match self {
            RejectStatus::BadRequest => "Bad Request",
            RejectStatus::Forbidden => "Forbidden",
            RejectStatus::NotFound => "Not Found",
            RejectStatus::UpgradeRequired => "Upgrade Required",
            RejectStatus::BadGateway => "Bad Gateway",
        }
    }
}

/// A well-formed upgrade request carrying a handshake token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Raw `Sec-WebSocket-Protocol` value; echoed back on success.
    pub token: String,
}

/// Result of inspecting buffered bytes.
#[derive(Debug, PartialEq, Eq)]
pub enum Inspect {
    /// The request head is not complete yet.
    NeedMore,
    /// Answer with the status and close.
    Reject(RejectStatus, &'static str),
    Upgrade(UpgradeRequest),
}

/// Classify a buffered request head.
pub fn inspect_request(buf: &[u8], cfg: &WsCfg) -> Inspect {
    let Some(header_end) = find_header_end(buf) else {
        return Inspect::NeedMore;
    };
    let Ok(header_str) = std::str::from_utf8(&buf[..header_end]) else {
        return Inspect::Reject(RejectStatus::BadRequest, "not http");
    };
    let mut lines = header_str.split("\r\n");
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Inspect::Reject(RejectStatus::BadRequest, "not http");
    }

    let mut upgrade = false;
    let mut connection_upgrade = false;
    let mut ws_key = false;
    let mut host: Option<&str> = None;
    let mut protocol: Option<&str> = None;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "upgrade" => upgrade |= value.to_ascii_lowercase().contains("websocket"),
            "connection" => connection_upgrade |= value.to_ascii_lowercase().contains("upgrade"),
            "sec-websocket-key" => ws_key |= !value.is_empty(),
            "host" => host = Some(value),
            "sec-websocket-protocol" => protocol = Some(value),
            _ => {}
        }
    }

    if method != "GET" || !upgrade || !connection_upgrade || !ws_key {
        return Inspect::Reject(RejectStatus::UpgradeRequired, "websocket upgrade required");
    }
    if !path_matches(cfg, path) || !host_matches(cfg, host) {
        return Inspect::Reject(RejectStatus::NotFound, "websocket path/host mismatch");
    }
    match protocol {
        Some(token) if !token.is_empty() => Inspect::Upgrade(UpgradeRequest {
            token: token.to_string(),
        }),
        _ => Inspect::Reject(RejectStatus::BadRequest, "missing handshake token"),
    }
}

/// Accept the WebSocket upgrade, replaying `head` to the acceptor and
/// echoing `token` as the selected subprotocol.
pub async fn accept_ws<S>(
    stream: S,
    head: Bytes,
    cfg: &WsCfg,
    token: &str,
) -> Result<WebSocketStream<PrefixedStream<S>>, ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let max_frame = (cfg.max_frame_bytes > 0).then_some(cfg.max_frame_bytes);
    let ws_cfg = WebSocketConfig {
        max_frame_size: max_frame,
        max_message_size: max_frame,
        ..WebSocketConfig::default()
    };
    let protocol = HeaderValue::from_str(token).map_err(|_| ServerError::Upgrade {
        status: RejectStatus::BadRequest,
        reason: "handshake token is not a header value",
    })?;
    let prefixed = PrefixedStream::new(head, stream);
    let ws = accept_hdr_async_with_config(
        prefixed,
        move |req: &Request, mut resp: Response| {
            debug!(path = %req.uri().path(), "websocket upgrade");
            resp.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
            Ok(resp)
        },
        Some(ws_cfg),
    )
    .await?;
    Ok(ws)
}

/// Answer with a bodyless status response.
pub async fn send_reject<S>(stream: &mut S, status: RejectStatus) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status.code(),
        status.reason_phrase()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HTTP_HEADER_END.len())
        .position(|w| w == HTTP_HEADER_END)
        .map(|idx| idx + HTTP_HEADER_END.len())
}

fn path_matches(cfg: &WsCfg, path: &str) -> bool {
    let path_only = path.split('?').next().unwrap_or("");
    path_only == cfg.path
}

fn host_matches(cfg: &WsCfg, host: Option<&str>) -> bool {
    let Some(expected) = cfg.host.as_deref() else {
        return true;
    };
    let Some(host) = host else {
        return false;
    };
    let host_only = match host.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(""),
        None => host.split(':').next().unwrap_or(""),
    };
    host_only.eq_ignore_ascii_case(expected)
}
