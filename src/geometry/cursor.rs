//! Bounds-checked little-endian reader over a decoded blob

use super::{EcefPoint, GeometryDecodeError};

/// Size of one encoded point: three f64 values
pub const POINT_SIZE: usize = 24;

/// Explicit read position over a byte slice.
///
/// Every read checks the remaining length first, so a failed read leaves
/// the offset where it was and never touches bytes past the end.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], GeometryDecodeError> {
        let bytes = self
            .data
            .get(self.offset..)
            .and_then(|rest| rest.get(..len))
            .ok_or(GeometryDecodeError::Truncated {
                what,
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            })?;
        self.offset += len;
        Ok(bytes)
    }

    /// Next byte without advancing
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Advance one byte if the next byte equals `expected`; report whether it did
    pub fn advance_if(&mut self, expected: u8) -> bool {
        if self.peek_u8() == Some(expected) {
            self.offset += 1;
            true
        } else {
            false
        }
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8, GeometryDecodeError> {
        Ok(self.take(1, what)?[0])
    }

    pub fn read_i32(&mut self, what: &'static str) -> Result<i32, GeometryDecodeError> {
        let bytes = self.take(4, what)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self, what: &'static str) -> Result<f64, GeometryDecodeError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(f64::from_le_bytes(buf))
    }

    pub fn read_point(&mut self) -> Result<EcefPoint, GeometryDecodeError> {
        // Check the whole point up front so a short read leaves the offset untouched
        self.ensure(POINT_SIZE, "point")?;
        Ok(EcefPoint {
            x: self.read_f64("point x")?,
            y: self.read_f64("point y")?,
            z: self.read_f64("point z")?,
        })
    }

    /// Fail unless at least `len` bytes remain
    pub fn ensure(&self, len: usize, what: &'static str) -> Result<(), GeometryDecodeError> {
        if self.remaining() < len {
            return Err(GeometryDecodeError::Truncated {
                what,
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            });
        }
        Ok(())
    }
}
