use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::TransportError;
use crate::traits::{BackendStream, ConnectFuture, Connector};

/// Default upper bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP connector for the search backend.
///
/// Each call to [`Connector::connect`] resolves `host:port` afresh, so a
/// backend that restarts on a new address is picked up on the next retry.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    /// Create a connector with the default connect timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` target string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured connect timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> ConnectFuture {
        let addr = self.addr();
        let timeout = self.timeout;
        Box::pin(async move {
            let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
                Err(_) => {
                    return Err(TransportError::Timeout {
                        addr,
                        after: timeout,
                    })
                }
            };
            // Queries are tiny; don't let Nagle hold them back.
            stream.set_nodelay(true)?;
            debug!(%addr, "connected to backend");
            Ok(BackendStream::from_tcp(stream))
        })
    }

    fn describe(&self) -> String {
        self.addr()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connects_to_listening_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let connector = TcpConnector::new("127.0.0.1", port);
        let stream = connector.connect().await.unwrap();
        assert!(stream.peer().ends_with(&format!(":{port}")));

        let (_reader, mut writer) = stream.into_split();
        writer.write_all(b"ping\n").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"ping\n");
    }

    #[tokio::test]
    async fn refused_connect_reports_target() {
        // Bind then drop to get a port with nothing listening on it.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let connector = TcpConnector::new("127.0.0.1", port);
        let err = connector.connect().await.unwrap_err();
        assert!(err.is_connect_failure());
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }

    #[test]
    fn describe_and_timeout_builder() {
        let connector =
            TcpConnector::new("localhost", 30717).with_timeout(Duration::from_millis(250));
        assert_eq!(connector.describe(), "localhost:30717");
        assert_eq!(connector.timeout(), Duration::from_millis(250));
    }
}
