/// Errors that can occur during frame encoding or buffering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The outbound query contains a `\n` that would split it into two frames.
    #[error("query contains an embedded frame terminator at byte {position}")]
    EmbeddedTerminator { position: usize },

    /// Buffered data grew past the maximum frame length without a terminator.
    #[error("unterminated frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
