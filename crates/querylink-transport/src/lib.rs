//! Stream transport to the search backend.
//!
//! This is the lowest layer of querylink. It knows how to open a byte stream
//! to the backend and nothing about what travels over it:
//! - [`Connector`] is the seam the supervisor opens sessions through
//! - [`TcpConnector`] is the production connector (host + port + timeout)
//! - [`BackendStream`] hands back boxed read/write halves of any stream

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpConnector, DEFAULT_CONNECT_TIMEOUT};
pub use traits::{BackendStream, BoxedReader, BoxedWriter, ConnectFuture, Connector};
