//! Replay adapter for bytes consumed before a protocol hand-off.
//!
//! The server reads the HTTP upgrade request head itself so it can validate
//! the handshake token and dial the destination before answering. The
//! WebSocket acceptor then needs to see the same bytes again; `PrefixedStream`
//! yields them first and continues with the socket afterwards.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A stream that yields `prefix` before reading from `inner`.
///
/// Writes always go straight to the inner stream.
pub struct PrefixedStream<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> PrefixedStream<S> {
    pub fn new(prefix: Bytes, inner: S) -> Self {
        Self { prefix, inner }
    }

    /// Bytes of the prefix not yet handed to a reader.
    pub fn prefix_remaining(&self) -> usize {
        self.prefix.len()
    }

    /// Returns the inner stream. Unread prefix bytes are dropped.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.prefix.has_remaining() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn replays_request_head_then_socket_bytes() {
        let (mut peer, local) = duplex(1024);
        let head = Bytes::from_static(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
        let mut stream = PrefixedStream::new(head.clone(), local);

        peer.write_all(b"\x82\x00").await.unwrap();
        drop(peer);

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();

        let mut expected = head.to_vec();
        expected.extend_from_slice(b"\x82\x00");
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn small_reads_drain_prefix_in_order() {
        let (_peer, local) = duplex(64);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"upgrade"), local);

        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"upg");
        assert_eq!(stream.prefix_remaining(), 4);

        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"rad");

        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"e");
        assert_eq!(stream.prefix_remaining(), 0);
    }

    #[tokio::test]
    async fn writes_bypass_prefix() {
        let (mut peer, local) = duplex(64);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"ignored"), local);

        stream
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\n\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 12];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"HTTP/1.1 101");
    }
}
