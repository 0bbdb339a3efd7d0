//! Netlink attribute (rtattr/nlattr) handling.
//!
//! Attributes are `{len:16, type:16, payload}` records padded to 4-byte
//! boundaries; the pad bytes are not counted in `len`. The two high bits
//! of the type carry flags, not type information, and are masked off
//! before dispatch.

use super::error::{Error, Result};
use super::record::Endian;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Check if this is a nested attribute.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Get the payload length (total length minus header).
    pub fn payload_len(&self) -> usize {
        (self.nla_len as usize).saturating_sub(NLA_HDRLEN)
    }

    /// Convert to bytes (host order, for message framing).
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

/// Iterator over netlink attributes in a buffer.
///
/// Yields `(type, payload)` pairs with the flag bits already masked off
/// the type. Truncated or malformed trailing bytes end the iteration.
pub struct AttrIter<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator over a TLV stream.
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    /// Check if there are no more attributes.
    pub fn is_empty(&self) -> bool {
        self.data.len() < NLA_HDRLEN
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Returns (attribute type, payload data).
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLA_HDRLEN {
            return None;
        }

        let read_u16 = |bytes: [u8; 2]| match self.endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        };
        let len = read_u16([self.data[0], self.data[1]]) as usize;
        let attr_type = read_u16([self.data[2], self.data[3]]) & NLA_TYPE_MASK;

        if len < NLA_HDRLEN || len > self.data.len() {
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned_len = nla_align(len);

        // Move to next attribute
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some((attr_type, payload))
    }
}

/// Builder for a flat TLV attribute stream (no message header).
///
/// Emission order is the caller's order. Nesting is done by building the
/// inner stream first and appending it as the raw payload of the outer
/// attribute.
#[derive(Debug)]
pub struct AttrWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl AttrWriter {
    /// Create a writer for the given byte order.
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    /// Append an attribute with a raw byte payload.
    pub fn bytes(&mut self, attr_type: u16, data: &[u8]) {
        let write_u16 = |value: u16| match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        let len = (NLA_HDRLEN + data.len()) as u16;
        self.buf.extend_from_slice(&write_u16(len));
        self.buf.extend_from_slice(&write_u16(attr_type));
        self.buf.extend_from_slice(data);
        // Pad to alignment; pad bytes are not counted in the length field
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append a u8 attribute.
    pub fn u8(&mut self, attr_type: u16, value: u8) {
        self.bytes(attr_type, &[value]);
    }

    /// Append a u16 attribute.
    pub fn u16(&mut self, attr_type: u16, value: u16) {
        match self.endian {
            Endian::Little => self.bytes(attr_type, &value.to_le_bytes()),
            Endian::Big => self.bytes(attr_type, &value.to_be_bytes()),
        }
    }

    /// Append a u32 attribute.
    pub fn u32(&mut self, attr_type: u16, value: u32) {
        match self.endian {
            Endian::Little => self.bytes(attr_type, &value.to_le_bytes()),
            Endian::Big => self.bytes(attr_type, &value.to_be_bytes()),
        }
    }

    /// Append a u64 attribute.
    pub fn u64(&mut self, attr_type: u16, value: u64) {
        match self.endian {
            Endian::Little => self.bytes(attr_type, &value.to_le_bytes()),
            Endian::Big => self.bytes(attr_type, &value.to_be_bytes()),
        }
    }

    /// Append an i64 attribute.
    pub fn i64(&mut self, attr_type: u16, value: i64) {
        self.u64(attr_type, value as u64);
    }

    /// Append a null-terminated string attribute.
    pub fn string(&mut self, attr_type: u16, value: &str) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.bytes(attr_type, &data);
    }

    /// True if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the stream bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Helper functions for extracting typed values from attribute payloads.
///
/// A zero-length payload for a scalar decodes as zero: the attribute's
/// presence is meaningful on its own, so an empty value still counts as
/// "present".
pub mod get {
    use super::*;

    /// Extract a u8 value.
    pub fn u8(data: &[u8]) -> Result<u8> {
        if data.is_empty() {
            return Ok(0);
        }
        Ok(data[0])
    }

    /// Extract a u16 value.
    pub fn u16(data: &[u8], endian: Endian) -> Result<u16> {
        if data.is_empty() {
            return Ok(0);
        }
        if data.len() < 2 {
            return Err(Error::InvalidAttribute("truncated u16 attribute".into()));
        }
        let bytes = [data[0], data[1]];
        Ok(match endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        })
    }

    /// Extract a u32 value.
    pub fn u32(data: &[u8], endian: Endian) -> Result<u32> {
        if data.is_empty() {
            return Ok(0);
        }
        if data.len() < 4 {
            return Err(Error::InvalidAttribute("truncated u32 attribute".into()));
        }
        let bytes = [data[0], data[1], data[2], data[3]];
        Ok(match endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Extract a u64 value.
    pub fn u64(data: &[u8], endian: Endian) -> Result<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        if data.len() < 8 {
            return Err(Error::InvalidAttribute("truncated u64 attribute".into()));
        }
        let bytes: [u8; 8] = data[..8].try_into().unwrap();
        Ok(match endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }

    /// Extract an i64 value.
    pub fn i64(data: &[u8], endian: Endian) -> Result<i64> {
        Ok(u64(data, endian)? as i64)
    }

    /// Extract a null-terminated string.
    pub fn string(data: &[u8]) -> Result<&str> {
        // Find null terminator or use whole buffer
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }

    /// Extract bytes (no interpretation).
    pub fn bytes(data: &[u8]) -> &[u8] {
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_pads_payload() {
        let mut w = AttrWriter::new(Endian::native());
        w.u8(1, 0xAA);
        w.u32(2, 0x11223344);
        let stream = w.into_bytes();

        // u8 attr: 4 header + 1 payload padded to 8; u32 attr: 4 + 4
        assert_eq!(stream.len(), 16);

        let attrs: Vec<_> = AttrIter::new(&stream, Endian::native()).collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].0, 1);
        assert_eq!(attrs[0].1, &[0xAA]);
        assert_eq!(attrs[1].0, 2);
        assert_eq!(get::u32(attrs[1].1, Endian::native()).unwrap(), 0x11223344);
    }

    #[test]
    fn test_iter_masks_flags() {
        let mut w = AttrWriter::new(Endian::native());
        w.u32(3 | NLA_F_NESTED, 9);
        let stream = w.into_bytes();

        let (attr_type, payload) = AttrIter::new(&stream, Endian::native()).next().unwrap();
        assert_eq!(attr_type, 3);
        assert_eq!(get::u32(payload, Endian::native()).unwrap(), 9);
    }

    #[test]
    fn test_iter_stops_on_truncated_attr() {
        let mut w = AttrWriter::new(Endian::native());
        w.u32(1, 42);
        let mut stream = w.into_bytes();
        // A header claiming more payload than remains
        stream.extend_from_slice(&[200u8, 0, 5, 0]);

        let attrs: Vec<_> = AttrIter::new(&stream, Endian::native()).collect();
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_string_round_trip() {
        let mut w = AttrWriter::new(Endian::native());
        w.string(1, "netem");
        let stream = w.into_bytes();

        let (_, payload) = AttrIter::new(&stream, Endian::native()).next().unwrap();
        assert_eq!(get::string(payload).unwrap(), "netem");
    }

    #[test]
    fn test_empty_scalar_payload_is_zero() {
        assert_eq!(get::u8(&[]).unwrap(), 0);
        assert_eq!(get::u16(&[], Endian::native()).unwrap(), 0);
        assert_eq!(get::u32(&[], Endian::native()).unwrap(), 0);
        assert_eq!(get::u64(&[], Endian::native()).unwrap(), 0);
    }

    #[test]
    fn test_truncated_scalar_rejected() {
        assert!(get::u32(&[1, 2], Endian::native()).is_err());
        assert!(get::u64(&[1, 2, 3, 4], Endian::native()).is_err());
    }

    #[test]
    fn test_big_endian_stream() {
        let mut w = AttrWriter::new(Endian::Big);
        w.u32(7, 0x01020304);
        let stream = w.into_bytes();
        assert_eq!(&stream[..4], &[0, 8, 0, 7]);
        assert_eq!(&stream[4..], &[1, 2, 3, 4]);

        let (attr_type, payload) = AttrIter::new(&stream, Endian::Big).next().unwrap();
        assert_eq!(attr_type, 7);
        assert_eq!(get::u32(payload, Endian::Big).unwrap(), 0x01020304);
    }
}
