use bytes::BytesMut;
use tracing::trace;

use crate::codec::{feed, Frames, DEFAULT_MAX_FRAME_LEN};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accumulates bytes read from the backend until they form complete frames.
///
/// One buffer belongs to exactly one connection session. It is cleared
/// whenever a new session starts so a partial frame from a dead connection
/// can never be glued onto data from the next one.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: BytesMut,
    max_frame_len: usize,
}

impl ReceiveBuffer {
    /// Create an empty buffer with the default maximum frame length.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create an empty buffer with an explicit maximum frame length.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_len,
        }
    }

    /// Append a chunk and iterate over the frames it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        feed(&mut self.buf, chunk)
    }

    /// Fail if the unterminated remainder has outgrown the frame limit.
    ///
    /// Call after draining [`feed`](Self::feed); a remainder this large means
    /// the peer is not speaking the newline protocol.
    pub fn check_remainder(&self) -> Result<()> {
        if self.buf.len() > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size: self.buf.len(),
                max: self.max_frame_len,
            });
        }
        Ok(())
    }

    /// Bytes received but not yet terminated.
    pub fn remainder(&self) -> &[u8] {
        &self.buf
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Configured maximum frame length.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Drop any buffered partial frame.
    pub fn clear(&mut self) {
        if !self.buf.is_empty() {
            trace!(discarded = self.buf.len(), "discarding partial frame");
        }
        self.buf.clear();
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
