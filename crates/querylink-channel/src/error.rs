/// Errors surfaced to callers of the query channel.
///
/// Transport failures on a live session never show up here; the supervisor
/// turns them into status events and a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The query could not be framed and was not sent.
    #[error("encoding error: {0}")]
    Encoding(#[from] querylink_frame::FrameError),

    /// `send` was called while no session is connected.
    #[error("not connected to backend")]
    NotConnected,

    /// The channel was created outside a tokio runtime.
    #[error("no tokio runtime available to drive the connection")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
