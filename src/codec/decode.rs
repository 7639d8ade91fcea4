//! Cursor over a received payload.

use bytes::Buf;

use crate::error::{EngineError, Result};

/// Read cursor over a little-endian payload.
///
/// Every `decode_*` call checks the remaining length first, so a short
/// payload surfaces as `TruncatedFrame` instead of a panic inside `Buf`.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    consumed: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Bytes read so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.consumed
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(EngineError::TruncatedFrame {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Read one unsigned byte.
    pub fn decode_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    /// Read a little-endian `u16`.
    pub fn decode_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.consumed += 2;
        Ok(self.buf.get_u16_le())
    }

    /// Read a little-endian `u32`.
    pub fn decode_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.consumed += 4;
        Ok(self.buf.get_u32_le())
    }

    /// Read a little-endian `i32`.
    pub fn decode_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        self.consumed += 4;
        Ok(self.buf.get_i32_le())
    }

    /// Borrow the next `n` bytes.
    pub fn decode_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        self.consumed += n;
        Ok(head)
    }

    /// Read a fixed-size string field.
    ///
    /// Bytes are interpreted as UTF-8 (lossy) and surrounding whitespace and
    /// NUL padding are trimmed.
    pub fn decode_string(&mut self, n: usize) -> Result<String> {
        let raw = self.decode_bytes(n)?;
        let text = String::from_utf8_lossy(raw);
        Ok(text.trim_matches(|c: char| c <= ' ').to_string())
    }

    /// Skip `n` padding bytes without interpreting them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.buf.advance(n);
        self.consumed += n;
        Ok(())
    }
}
