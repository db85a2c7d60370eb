//! The server-side connection handed to acceptor callbacks.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::transport::PipeTransport;

/// A newly established connection as seen by the listening side.
///
/// A `ServerConnection` owns the server-side transport of a channel pair.
/// It is delivered to the listener's acceptor callback during
/// [`connect`]; an acceptor that wants to keep talking to the client must
/// move it somewhere — a connection left to drop at the end of the
/// callback closes its half, and the client transport reads EOF.
///
/// [`connect`]: crate::registry::PipeRegistry::connect
pub struct ServerConnection {
    transport: PipeTransport,
}

impl ServerConnection {
    /// Build a connection around a server-side transport.
    pub(crate) fn new_for_transport(transport: PipeTransport) -> Self {
        debug_assert!(transport.is_server());
        Self { transport }
    }

    /// The underlying server-side transport.
    #[inline]
    pub fn transport(&self) -> &PipeTransport {
        &self.transport
    }

    /// Consume the connection, yielding the transport.
    pub fn into_transport(self) -> PipeTransport {
        self.transport
    }
}

impl AsyncRead for ServerConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.transport).poll_read(cx, buf)
    }
}

impl AsyncWrite for ServerConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.transport).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.transport).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.transport).poll_shutdown(cx)
    }
}
