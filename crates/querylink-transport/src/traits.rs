use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Read half of a backend stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a backend stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Future returned by [`Connector::connect`].
pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<BackendStream>> + Send + 'static>>;

/// Opens byte streams to the backend.
///
/// The supervisor calls `connect` once per session attempt and owns the
/// returned stream until the session ends. Implementations must not block
/// the calling thread; all waiting happens inside the returned future.
pub trait Connector: Send + Sync + 'static {
    /// Start a new connect attempt.
    fn connect(&self) -> ConnectFuture;

    /// Human-readable target for logs and status messages.
    fn describe(&self) -> String;
}

/// A connected backend stream, split into independently owned halves.
///
/// The read half goes to the session's read loop, the write half to its
/// writer task, so neither direction ever waits on the other.
pub struct BackendStream {
    reader: BoxedReader,
    writer: BoxedWriter,
    peer: String,
}

impl BackendStream {
    /// Wrap any bidirectional stream (TCP, in-memory duplex, ...).
    pub fn new<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_halves(Box::new(reader), Box::new(writer), peer)
    }

    /// Build from halves that were split elsewhere.
    pub fn from_halves(reader: BoxedReader, writer: BoxedWriter, peer: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            peer: peer.into(),
        }
    }

    /// Create a backend stream from a connected TCP socket.
    pub fn from_tcp(stream: tokio::net::TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp".to_string());
        let (reader, writer) = stream.into_split();
        Self::from_halves(Box::new(reader), Box::new(writer), peer)
    }

    /// Address or label of the remote end.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Consume the stream and return its halves.
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        (self.reader, self.writer)
    }
}

impl fmt::Debug for BackendStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendStream")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
