//! Event Frame Decoder
//!
//! Turns the raw byte stream of a `text/event-stream` response into discrete
//! frames. A frame is the text between two blank-line delimiters:
//!
//! ```text
//! data: {"type":"delta","text":"Hi "}\n
//! \n
//! data: {"type":"final"}\n
//! \n
//! ```
//!
//! Chunks may split anywhere, including inside a multi-byte character or in
//! the middle of the delimiter. The decoder buffers raw bytes and only
//! converts a frame to text once its terminating blank line has arrived, so
//! split characters are reassembled before decoding.
//!
//! Carriage returns are dropped on input. JSON payloads cannot contain a raw
//! `\r`, and dropping it lets `\r\n\r\n` servers share the `\n\n` path.

use futures::stream::{self, Stream, StreamExt};

use crate::error::ChatError;

/// Record separator of the event stream
pub const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Prefix of a payload line within a frame
pub const DATA_PREFIX: &str = "data: ";

/// Minimum buffer capacity for the decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Incremental frame splitter
///
/// Push chunks in arrival order, then drain complete frames with
/// [`FrameDecoder::next_frame`]. A trailing partial frame stays buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes already scanned for a delimiter without finding one
    scanned: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with the default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            scanned: 0,
        }
    }

    /// Append a chunk to the buffer
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Split off the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<String> {
        // Resume one byte early so a delimiter split across pushes is found
        let start = self.scanned.saturating_sub(FRAME_DELIMITER.len() - 1);
        let Some(offset) = self.buffer[start..]
            .windows(FRAME_DELIMITER.len())
            .position(|w| w == FRAME_DELIMITER)
        else {
            self.scanned = self.buffer.len();
            return None;
        };

        let end = start + offset;
        let frame = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
        self.buffer.drain(..end + FRAME_DELIMITER.len());
        self.scanned = 0;
        Some(frame)
    }

    /// Number of bytes waiting for a delimiter
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any buffered partial frame
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

/// Extract the payload of a frame
///
/// Only the first `data: ` line is read; further payload lines are not
/// concatenated in this protocol. Returns `None` when the frame has no
/// payload line or the payload is empty.
#[must_use]
pub fn frame_payload(frame: &str) -> Option<&str> {
    let payload = frame
        .lines()
        .find_map(|line| line.strip_prefix(DATA_PREFIX))?;
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Lazily decode a chunk stream into frames
///
/// Frames are yielded strictly in arrival order. A chunk error is yielded
/// once and the caller is expected to stop. When the chunk stream ends, any
/// unterminated trailing frame is discarded.
pub fn frames<S>(chunks: S) -> impl Stream<Item = Result<String, ChatError>>
where
    S: Stream<Item = Result<Vec<u8>, ChatError>> + Unpin,
{
    stream::unfold(
        (chunks, FrameDecoder::new()),
        |(mut chunks, mut decoder)| async move {
            loop {
                if let Some(frame) = decoder.next_frame() {
                    return Some((Ok(frame), (chunks, decoder)));
                }

                match chunks.next().await {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => return Some((Err(e), (chunks, decoder))),
                    None => {
                        if decoder.buffered() > 0 {
                            tracing::debug!(
                                bytes = decoder.buffered(),
                                "Stream closed mid-frame, discarding partial frame"
                            );
                        }
                        return None;
                    }
                }
            }
        },
    )
}
