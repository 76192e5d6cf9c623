use bytes::{Buf, Bytes, BytesMut};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accumulates raw bytes across append calls and locates a delimiter
/// sequence inside them.
///
/// A delimiter may arrive split across any number of chunks; the search
/// always runs over everything accumulated so far. There is no upper bound
/// on accumulation — a peer that never sends a delimiter grows the buffer
/// until memory runs out (accepted protocol limitation).
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append a chunk of received bytes.
    pub fn append(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Index of the first exact match of `delimiter`, or `None`.
    pub fn find_delimiter(&self, delimiter: &[u8]) -> Option<usize> {
        if delimiter.is_empty() || self.buf.len() < delimiter.len() {
            return None;
        }
        self.buf
            .windows(delimiter.len())
            .position(|window| window == delimiter)
    }

    /// Return the bytes strictly before `upto`, then discard them plus
    /// `drop_len` additional bytes (the delimiter itself). Bytes after the
    /// dropped region stay buffered for the next segment.
    ///
    /// Both `upto` and `drop_len` are clamped to what is actually
    /// buffered, so out-of-range values extract or drop everything rather
    /// than panic.
    ///
    /// No byte is duplicated or lost across successive extractions.
    pub fn extract_and_reset(&mut self, upto: usize, drop_len: usize) -> Bytes {
        let upto = upto.min(self.buf.len());
        let segment = self.buf.split_to(upto).freeze();
        let drop = drop_len.min(self.buf.len());
        self.buf.advance(drop);
        segment
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View of the buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
