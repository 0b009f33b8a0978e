use std::time::Duration;

use querylink_frame::DEFAULT_MAX_FRAME_LEN;
use querylink_transport::{TcpConnector, DEFAULT_CONNECT_TIMEOUT};

/// Backend host the launcher talks to by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Port the search backend listens on.
pub const DEFAULT_PORT: u16 = 30717;
/// Fixed delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Frames that may wait for the writer before new ones are dropped.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;
/// Events a subscriber may fall behind before it starts losing the oldest.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration for a query channel and its supervisor.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Backend host name or address.
    pub host: String,
    /// Backend TCP port.
    pub port: u16,
    /// Delay between a failure and the next connect attempt. No backoff.
    pub reconnect_delay: Duration,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Longest unterminated inbound frame tolerated before the session is dropped.
    pub max_frame_len: usize,
    /// Outbound frames queued per session before sends are dropped.
    pub outbound_capacity: usize,
    /// Event bus capacity.
    pub event_capacity: usize,
    /// Frame sent on `cancel()`, for backends that understand one.
    pub cancel_frame: Option<String>,
}

impl ChannelConfig {
    /// Override the backend address.
    pub fn with_backend(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Override the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the maximum inbound frame length.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Send `frame` to the backend whenever a query is cancelled.
    pub fn with_cancel_frame(mut self, frame: impl Into<String>) -> Self {
        self.cancel_frame = Some(frame.into());
        self
    }

    /// `host:port` of the backend.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// TCP connector for the configured backend.
    pub fn tcp_connector(&self) -> TcpConnector {
        TcpConnector::new(self.host.clone(), self.port).with_timeout(self.connect_timeout)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            cancel_frame: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend() {
        let config = ChannelConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:30717");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert!(config.cancel_frame.is_none());
    }

    #[test]
    fn builders_override_fields() {
        let config = ChannelConfig::default()
            .with_backend("search.local", 4000)
            .with_reconnect_delay(Duration::from_millis(100))
            .with_connect_timeout(Duration::from_secs(1))
            .with_cancel_frame("!cancel");
        assert_eq!(config.addr(), "search.local:4000");
        assert_eq!(config.reconnect_delay, Duration::from_millis(100));
        assert_eq!(config.cancel_frame.as_deref(), Some("!cancel"));

        let connector = config.tcp_connector();
        assert_eq!(connector.addr(), "search.local:4000");
        assert_eq!(connector.timeout(), Duration::from_secs(1));
    }
}
