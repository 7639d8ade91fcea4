//! Append-only builder for outbound payloads.

use bytes::{BufMut, Bytes, BytesMut};

/// Write cursor producing a little-endian payload.
///
/// Encoding never fails: strings longer than their field are truncated and
/// shorter ones are zero padded.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Create a writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn encode_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    #[inline]
    pub fn encode_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    #[inline]
    pub fn encode_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    #[inline]
    pub fn encode_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    /// Append raw bytes as-is.
    #[inline]
    pub fn encode_bytes(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    /// Append exactly `len` bytes: the string's bytes, truncated or zero padded.
    pub fn encode_string(&mut self, value: &str, len: usize) {
        let raw = value.as_bytes();
        let take = raw.len().min(len);
        self.buf.put_slice(&raw[..take]);
        self.buf.put_bytes(0, len - take);
    }

    /// Append `n` zero padding bytes.
    #[inline]
    pub fn pad(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    /// Finish and return the payload.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
