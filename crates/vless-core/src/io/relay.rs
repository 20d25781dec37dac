//! Session relay engine.
//!
//! A session pairs the client-facing WebSocket with the destination-facing
//! byte stream. Two forwarding loops run concurrently inside one future:
//!
//! - **uplink** (client -> destination) writes the handshake's trailing
//!   payload first, then every binary or text message in arrival order;
//! - **downlink** (destination -> client) prefixes its very first chunk with
//!   [`DOWNLINK_PROLOGUE`] and forwards later chunks untouched.
//!
//! Whichever loop finishes first (close, error) or an external cancellation
//! triggers the shared shutdown. Both loops then stop and each channel is
//! closed exactly once.

use std::io;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Header sent in front of the first downlink chunk.
pub const DOWNLINK_PROLOGUE: [u8; 2] = [0x00, 0x00];

/// Upper bound on flushing the client close frame during teardown.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for recording relay metrics.
pub trait RelayMetrics {
    /// Record bytes forwarded from the client to the destination.
    fn record_inbound(&self, bytes: u64);
    /// Record bytes forwarded from the destination to the client.
    fn record_outbound(&self, bytes: u64);
}

/// No-op metrics implementation for cases where metrics aren't needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl RelayMetrics for NoOpMetrics {
    #[inline]
    fn record_inbound(&self, _bytes: u64) {}
    #[inline]
    fn record_outbound(&self, _bytes: u64) {}
}

/// Why a session left the relaying state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    DestinationClosed,
    ClientError,
    DestinationError,
    Cancelled,
}

impl CloseReason {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::DestinationClosed => "destination_closed",
            CloseReason::ClientError => "client_error",
            CloseReason::DestinationError => "destination_error",
            CloseReason::Cancelled => "cancelled",
        }
    }
}

/// Per-session shared state.
///
/// The close flag records the first shutdown reason; later calls are no-ops.
#[derive(Debug)]
pub struct RelaySession {
    reason: OnceLock<CloseReason>,
    first_downlink_sent: AtomicBool,
    cancel: CancellationToken,
}

impl RelaySession {
    /// Create a session that is also stopped when `parent` is cancelled.
    pub fn new(parent: &CancellationToken) -> Self {
        Self::with_token(parent.child_token())
    }

    /// Create a session with no external cancellation source.
    pub fn detached() -> Self {
        Self::with_token(CancellationToken::new())
    }

    fn with_token(cancel: CancellationToken) -> Self {
        Self {
            reason: OnceLock::new(),
            first_downlink_sent: AtomicBool::new(false),
            cancel,
        }
    }

    /// Shared shutdown. Returns `true` only for the call that closed the session.
    pub fn shutdown(&self, reason: CloseReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        debug!(reason = reason.as_str(), "relay session shutting down");
        self.cancel.cancel();
        true
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// Whether the first downlink chunk has gone out.
    pub fn first_downlink_sent(&self) -> bool {
        self.first_downlink_sent.load(Ordering::Acquire)
    }

    /// Resolves once the session is shut down or externally cancelled.
    async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    /// Returns `true` exactly once, for the chunk that must carry the prologue.
    fn claim_first_downlink(&self) -> bool {
        !self.first_downlink_sent.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug)]
enum RelayError {
    Client(WsError),
    Destination(io::Error),
}

impl RelayError {
    fn close_reason(&self) -> CloseReason {
        match self {
            // Peer went away after a close handshake; not a failure.
            RelayError::Client(WsError::ConnectionClosed) => CloseReason::ClientClosed,
            RelayError::Client(_) => CloseReason::ClientError,
            RelayError::Destination(_) => CloseReason::DestinationError,
        }
    }
}

/// Relay a session until either side closes, errors, or the session is cancelled.
///
/// `early_data` is written to the destination before any client message.
/// Returns the reason recorded by the first shutdown.
pub async fn relay_session<C, D, M>(
    session: &RelaySession,
    client: C,
    destination: D,
    early_data: &[u8],
    buffer_size: usize,
    metrics: &M,
) -> CloseReason
where
    C: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
    D: AsyncRead + AsyncWrite + Unpin,
    M: RelayMetrics,
{
    let (mut client_tx, mut client_rx) = client.split();
    let (mut dest_rx, mut dest_tx) = tokio::io::split(destination);

    let uplink = async {
        let result = tokio::select! {
            r = forward_uplink(&mut client_rx, &mut dest_tx, early_data, metrics) => r,
            _ = session.stopped() => return,
        };
        let reason = match result {
            Ok(()) => CloseReason::ClientClosed,
            Err(err) => {
                debug!(error = ?err, "uplink failed");
                err.close_reason()
            }
        };
        session.shutdown(reason);
    };

    let downlink = async {
        let result = tokio::select! {
            r = forward_downlink(session, &mut dest_rx, &mut client_tx, buffer_size, metrics) => r,
            _ = session.stopped() => return,
        };
        let reason = match result {
            Ok(()) => CloseReason::DestinationClosed,
            Err(err) => {
                debug!(error = ?err, "downlink failed");
                err.close_reason()
            }
        };
        session.shutdown(reason);
    };

    tokio::join!(uplink, downlink);

    // Only takes effect when the parent token stopped us.
    session.shutdown(CloseReason::Cancelled);

    // Close each side once; errors from an already-closed peer are expected.
    if let Err(err) = dest_tx.shutdown().await {
        debug!(error = %err, "destination already closed");
    }
    match tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, client_tx.close()).await {
        Ok(Err(err)) => debug!(error = %err, "client already closed"),
        Err(_) => debug!("client close frame not flushed in time"),
        Ok(Ok(())) => {}
    }

    session.close_reason().unwrap_or(CloseReason::Cancelled)
}

async fn forward_uplink<R, W, M>(
    client_rx: &mut R,
    dest_tx: &mut W,
    early_data: &[u8],
    metrics: &M,
) -> Result<(), RelayError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    W: AsyncWrite + Unpin,
    M: RelayMetrics,
{
    if !early_data.is_empty() {
        dest_tx
            .write_all(early_data)
            .await
            .map_err(RelayError::Destination)?;
        metrics.record_inbound(early_data.len() as u64);
    }

    while let Some(msg) = client_rx.next().await {
        let data = match msg.map_err(RelayError::Client)? {
            Message::Binary(data) => data,
            Message::Text(text) => text.into_bytes(),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };
        if data.is_empty() {
            continue;
        }
        dest_tx
            .write_all(&data)
            .await
            .map_err(RelayError::Destination)?;
        metrics.record_inbound(data.len() as u64);
    }
    Ok(())
}

async fn forward_downlink<R, W, M>(
    session: &RelaySession,
    dest_rx: &mut R,
    client_tx: &mut W,
    buffer_size: usize,
    metrics: &M,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: Sink<Message, Error = WsError> + Unpin,
    M: RelayMetrics,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = dest_rx
            .read(&mut buf)
            .await
            .map_err(RelayError::Destination)?;
        if n == 0 {
            return Ok(());
        }
        let frame = if session.claim_first_downlink() {
            let mut framed = Vec::with_capacity(DOWNLINK_PROLOGUE.len() + n);
            framed.extend_from_slice(&DOWNLINK_PROLOGUE);
            framed.extend_from_slice(&buf[..n]);
            framed
        } else {
            buf[..n].to_vec()
        };
        client_tx
            .send(Message::Binary(frame))
            .await
            .map_err(RelayError::Client)?;
        metrics.record_outbound(n as u64);
    }
}
