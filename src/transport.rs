//! Channel-pair creation and the transport wrapper around one half.
//!
//! A [`ChannelPairFactory`] produces two connected [`ChannelHandle`]s such
//! that bytes written to one are readable from the other. The default
//! factory, [`InMemoryPairFactory`], is built on `tokio::io::duplex` and
//! never touches the OS — the whole point of the harness is that the
//! "wire" lives inside the process.
//!
//! A [`PipeTransport`] owns one half of such a pair, knows which side it
//! is, and (on the client side) carries the `debug-pipe:name=` address it
//! was connected to.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use crate::error::Result;

/// Default in-memory buffer size per direction (64KB).
pub const DEFAULT_PAIR_CAPACITY: usize = 64 * 1024;

/// One raw half of a full-duplex channel pair.
///
/// Ownership moves into a [`PipeTransport`] during connection
/// establishment; a handle dropped before that point closes its half of
/// the channel, so no half can leak on an error path.
pub struct ChannelHandle {
    io: DuplexStream,
    close_on_exec: bool,
}

impl ChannelHandle {
    /// Wrap a duplex stream half as a channel handle.
    pub fn from_duplex(io: DuplexStream) -> Self {
        Self {
            io,
            close_on_exec: false,
        }
    }

    /// Mark this handle close-on-exec.
    ///
    /// In-memory handles have no descriptor to leak across `exec`, so this
    /// only records the flag; factories backed by real descriptors should
    /// honor it.
    pub fn set_close_on_exec(&mut self) {
        self.close_on_exec = true;
    }

    /// Whether the handle has been marked close-on-exec.
    #[inline]
    pub fn close_on_exec(&self) -> bool {
        self.close_on_exec
    }

    fn into_duplex(self) -> DuplexStream {
        self.io
    }
}

/// Source of connected channel pairs.
///
/// Implementations must either return two handles that are actually
/// connected to each other, or report the failure — resource exhaustion
/// is reported as [`PipeError::OutOfMemory`], never silently tolerated.
///
/// [`PipeError::OutOfMemory`]: crate::error::PipeError::OutOfMemory
pub trait ChannelPairFactory {
    /// Create two connected, bidirectional channel handles.
    ///
    /// `blocking` is the mode requested for the underlying primitive; the
    /// harness always asks for non-blocking (`false`). In-memory factories
    /// may ignore it.
    fn full_duplex_pair(&self, blocking: bool) -> Result<(ChannelHandle, ChannelHandle)>;
}

/// Default factory producing `tokio::io::duplex` pairs.
#[derive(Debug, Clone)]
pub struct InMemoryPairFactory {
    capacity: usize,
}

impl InMemoryPairFactory {
    /// Create a factory with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PAIR_CAPACITY)
    }

    /// Create a factory with a specific per-direction buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for InMemoryPairFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelPairFactory for InMemoryPairFactory {
    fn full_duplex_pair(&self, _blocking: bool) -> Result<(ChannelHandle, ChannelHandle)> {
        let (a, b) = tokio::io::duplex(self.capacity);
        Ok((ChannelHandle::from_duplex(a), ChannelHandle::from_duplex(b)))
    }
}

/// A transport owning one half of a debug-pipe channel.
///
/// The client side carries the `debug-pipe:name=<name>` address it was
/// connected to; the server side carries none. Reading from a transport
/// whose peer has been dropped yields EOF (`Ok` with zero bytes) — that is
/// how an abandoned connection is observed.
#[derive(Debug)]
pub struct PipeTransport {
    io: DuplexStream,
    address: Option<String>,
    is_server: bool,
    auth_mechanisms: Option<Vec<String>>,
}

impl PipeTransport {
    /// Wrap a channel handle as a transport for one side of a connection.
    pub fn new_for_channel(handle: ChannelHandle, is_server: bool, address: Option<String>) -> Self {
        Self {
            io: handle.into_duplex(),
            address,
            is_server,
            auth_mechanisms: None,
        }
    }

    /// The address this transport was connected to, if it is a client.
    #[inline]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Whether this is the server-side half.
    #[inline]
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Restrict the authentication mechanisms offered on this transport.
    ///
    /// `None` means "no restriction" and is the initial state.
    pub fn set_auth_mechanisms(&mut self, mechanisms: Option<Vec<String>>) {
        self.auth_mechanisms = mechanisms;
    }

    /// The configured authentication mechanisms, if restricted.
    pub fn auth_mechanisms(&self) -> Option<&[String]> {
        self.auth_mechanisms.as_deref()
    }
}

impl AsyncRead for PipeTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for PipeTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_close_on_exec_flag() {
        let (mut a, b) = InMemoryPairFactory::new().full_duplex_pair(false).unwrap();
        assert!(!a.close_on_exec());
        assert!(!b.close_on_exec());
        a.set_close_on_exec();
        assert!(a.close_on_exec());
    }

    #[test]
    fn test_transport_sides() {
        let (a, b) = InMemoryPairFactory::new().full_duplex_pair(false).unwrap();
        let client = PipeTransport::new_for_channel(a, false, Some("debug-pipe:name=x".into()));
        let server = PipeTransport::new_for_channel(b, true, None);

        assert!(!client.is_server());
        assert_eq!(client.address(), Some("debug-pipe:name=x"));
        assert!(server.is_server());
        assert_eq!(server.address(), None);
    }

    #[test]
    fn test_auth_mechanisms() {
        let (a, _b) = InMemoryPairFactory::new().full_duplex_pair(false).unwrap();
        let mut server = PipeTransport::new_for_channel(a, true, None);

        assert_eq!(server.auth_mechanisms(), None);
        server.set_auth_mechanisms(Some(vec!["EXTERNAL".to_string()]));
        assert_eq!(server.auth_mechanisms().unwrap(), ["EXTERNAL".to_string()]);
    }

    #[tokio::test]
    async fn test_pair_is_connected_both_directions() {
        let (a, b) = InMemoryPairFactory::new().full_duplex_pair(false).unwrap();
        let mut client = PipeTransport::new_for_channel(a, false, None);
        let mut server = PipeTransport::new_for_channel(b, true, None);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_eof() {
        let (a, b) = InMemoryPairFactory::new().full_duplex_pair(false).unwrap();
        let mut client = PipeTransport::new_for_channel(a, false, None);
        drop(PipeTransport::new_for_channel(b, true, None));

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "dropped peer must read as EOF");
    }
}
