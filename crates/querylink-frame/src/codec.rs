use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame terminator: a single newline.
pub const TERMINATOR: u8 = b'\n';

/// Default maximum length of an unterminated inbound frame: 1 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// One complete frame, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// The total wire size of this frame (payload + terminator).
    pub fn wire_size(&self) -> usize {
        self.payload.len() + 1
    }

    /// True for an empty or whitespace-only payload.
    pub fn is_blank(&self) -> bool {
        self.payload.iter().all(u8::is_ascii_whitespace)
    }
}

/// Encode a query into a complete outbound frame.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────┬──────┐
/// │ Query text (UTF-8)       │ 0x0A │
/// └──────────────────────────┴──────┘
/// ```
///
/// Queries containing `\n` are rejected rather than stripped, so what the
/// backend receives is always exactly what the caller submitted.
pub fn encode_query(query: &str) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(query.len() + 1);
    encode_query_into(query, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode a query and append the frame to `dst`.
///
/// On error `dst` is left untouched.
pub fn encode_query_into(query: &str, dst: &mut BytesMut) -> Result<()> {
    if let Some(position) = query.bytes().position(|b| b == TERMINATOR) {
        return Err(FrameError::EmbeddedTerminator { position });
    }
    dst.reserve(query.len() + 1);
    dst.put_slice(query.as_bytes());
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Decode one frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a terminator yet.
/// On success, consumes the frame bytes and its terminator from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    let end = src.iter().position(|&b| b == TERMINATOR)?;
    let mut line = src.split_to(end + 1);
    line.truncate(end);
    Some(Frame {
        payload: line.freeze(),
    })
}

/// Append `chunk` to `buffer` and split off every complete frame.
///
/// Frames are produced lazily, one per `next()`. Whatever follows the last
/// terminator stays in `buffer` for the next call. Dropping the iterator
/// early leaves the unread frames in `buffer`, so nothing is ever lost.
pub fn feed<'a>(buffer: &'a mut BytesMut, chunk: &[u8]) -> Frames<'a> {
    buffer.extend_from_slice(chunk);
    Frames { buffer }
}

/// Iterator over the complete frames held in a buffer.
#[derive(Debug)]
pub struct Frames<'a> {
    buffer: &'a mut BytesMut,
}

impl Frames<'_> {
    /// Bytes left over after the frames yielded so far.
    pub fn remainder(&self) -> &[u8] {
        self.buffer
    }
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        decode_frame(self.buffer)
    }
}
