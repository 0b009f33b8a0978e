use std::time::Duration;

/// Errors that can occur while opening or using a backend stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the backend address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The connect attempt did not complete in time.
    #[error("connect to {addr} timed out after {after:?}")]
    Timeout { addr: String, after: Duration },

    /// An I/O error occurred on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend closed the stream.
    #[error("connection closed by peer")]
    PeerClosed,
}

impl TransportError {
    /// True when the error is a refused or unreachable connect, as opposed to
    /// a failure on a live stream.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
