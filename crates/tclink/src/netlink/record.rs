//! Fixed-layout record serialization.
//!
//! Traffic-control option blocks embed packed kernel structs inside
//! attribute payloads. Each record type spells out its own field
//! sequence against these cursors instead of relying on in-memory
//! layout, so the wire image is byte-exact regardless of how the
//! compiler arranges the Rust struct. Byte order is an explicit
//! parameter; callers talking to the local kernel pass
//! [`Endian::native`].

use super::error::{Error, Result};

/// Byte order for fixed-record and scalar-attribute coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the running host, which is what the local kernel
    /// speaks on netlink payloads.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// Cursor that appends fixed-width fields to a growing buffer.
#[derive(Debug)]
pub struct RecordWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl RecordWriter {
    /// Create a writer for the given byte order.
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    /// Create a writer sized for a known record.
    pub fn with_capacity(endian: Endian, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            endian,
        }
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn u32(&mut self, value: u32) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn u64(&mut self, value: u64) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn i16(&mut self, value: i16) {
        self.u16(value as u16);
    }

    pub fn i32(&mut self, value: i32) {
        self.u32(value as u32);
    }

    pub fn i64(&mut self, value: i64) {
        self.u64(value as u64);
    }

    /// Emit `count` zero bytes of explicit layout padding.
    pub fn pad(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the record bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor that reads fixed-width fields from a validated window.
///
/// Construction validates the window length up front, so the field
/// reads themselves do not re-check bounds. Each record type's
/// unmarshal must consume exactly the size it declared.
#[derive(Debug)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> RecordReader<'a> {
    /// Wrap a payload whose length must equal the record's packed size.
    pub fn exact(data: &'a [u8], size: usize, what: &'static str, endian: Endian) -> Result<Self> {
        if data.len() != size {
            return Err(Error::SizeMismatch {
                what,
                expected: size,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            pos: 0,
            endian,
        })
    }

    /// Wrap the first `size` bytes of a payload that may carry trailing
    /// padding or extensions emitted by newer kernels.
    pub fn prefix(data: &'a [u8], size: usize, what: &'static str, endian: Endian) -> Result<Self> {
        if data.len() < size {
            return Err(Error::InsufficientBytes {
                what,
                expected: size,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: &data[..size],
            pos: 0,
            endian,
        })
    }

    pub fn u8(&mut self) -> u8 {
        let value = self.data[self.pos];
        self.pos += 1;
        value
    }

    pub fn u16(&mut self) -> u16 {
        let bytes: [u8; 2] = self.data[self.pos..self.pos + 2].try_into().unwrap();
        self.pos += 2;
        match self.endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(&mut self) -> u32 {
        let bytes: [u8; 4] = self.data[self.pos..self.pos + 4].try_into().unwrap();
        self.pos += 4;
        match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn u64(&mut self) -> u64 {
        let bytes: [u8; 8] = self.data[self.pos..self.pos + 8].try_into().unwrap();
        self.pos += 8;
        match self.endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        }
    }

    pub fn i16(&mut self) -> i16 {
        self.u16() as i16
    }

    pub fn i32(&mut self) -> i32 {
        self.u32() as i32
    }

    pub fn i64(&mut self) -> i64 {
        self.u64() as i64
    }

    /// Skip `count` bytes of explicit layout padding.
    pub fn skip(&mut self, count: usize) {
        self.pos += count;
    }
}
