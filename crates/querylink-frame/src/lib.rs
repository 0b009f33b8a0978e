//! Newline-delimited framing for the backend protocol.
//!
//! Every message in either direction is UTF-8 text followed by a single
//! `\n`. There is no length prefix and no message id, so the only framing
//! work is:
//! - refusing outbound queries that would split into two frames
//! - splitting inbound bytes on the terminator, carrying the tail over
//!
//! No partial frames reach callers, no matter how the stream is chunked.

pub mod buffer;
pub mod codec;
pub mod error;

pub use buffer::ReceiveBuffer;
pub use codec::{
    decode_frame, encode_query, encode_query_into, feed, Frame, Frames, DEFAULT_MAX_FRAME_LEN,
    TERMINATOR,
};
pub use error::{FrameError, Result};
