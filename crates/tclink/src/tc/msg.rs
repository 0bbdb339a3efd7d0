//! The fixed tcmsg header shared by qdisc, class, and filter messages.

use crate::netlink::error::Result;
use crate::netlink::record::{Endian, RecordReader, RecordWriter};

/// Fixed header carried by every traffic-control message
/// (mirrors struct tcmsg).
///
/// Wire layout: family byte plus three pad bytes, then interface index,
/// handle, parent, and info as 32-bit fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcMsg {
    /// Address family (AF_UNSPEC for tc).
    pub family: u8,
    /// Interface index the object is attached to.
    pub ifindex: i32,
    /// Composite major:minor handle naming the object.
    pub handle: u32,
    /// Handle of the parent object.
    pub parent: u32,
    /// Type-specific info field (filters pack protocol and priority here).
    pub info: u32,
}

impl TcMsg {
    /// Packed wire size.
    pub const SIZE: usize = 20;

    /// Create an empty header (AF_UNSPEC, no interface).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface index.
    pub fn with_ifindex(mut self, ifindex: i32) -> Self {
        self.ifindex = ifindex;
        self
    }

    /// Set the object handle.
    pub fn with_handle(mut self, handle: u32) -> Self {
        self.handle = handle;
        self
    }

    /// Set the parent handle.
    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = parent;
        self
    }

    /// Set the info field.
    pub fn with_info(mut self, info: u32) -> Self {
        self.info = info;
        self
    }

    /// Serialize to the packed kernel layout.
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u8(self.family);
        w.pad(3);
        w.i32(self.ifindex);
        w.u32(self.handle);
        w.u32(self.parent);
        w.u32(self.info);
        w.finish()
    }

    /// Deserialize from the packed kernel layout.
    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "tcmsg", endian)?;
        let family = r.u8();
        r.skip(3);
        Ok(Self {
            family,
            ifindex: r.i32(),
            handle: r.u32(),
            parent: r.u32(),
            info: r.u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tc::handle;

    #[test]
    fn test_round_trip() {
        let msg = TcMsg::new()
            .with_ifindex(3)
            .with_handle(handle::build_handle(0xFFFF, 0x0000))
            .with_parent(handle::HANDLE_INGRESS)
            .with_info(7);

        assert_eq!(msg.handle, 0xFFFF0000);
        assert_eq!(msg.parent, 0xFFFFFFF1);

        for endian in [Endian::Little, Endian::Big] {
            let bytes = msg.marshal(endian);
            assert_eq!(bytes.len(), TcMsg::SIZE);
            assert_eq!(TcMsg::unmarshal(&bytes, endian).unwrap(), msg);
        }
    }

    #[test]
    fn test_wrong_size_rejected() {
        let bytes = [0u8; 19];
        assert!(TcMsg::unmarshal(&bytes, Endian::native()).is_err());
    }
}
