//! Universal 32-bit comparison (u32) filter options.
//!
//! Pure TLV schema. The selector payload is variable-length: a packed
//! 15-byte header whose key count determines how many 16-byte key
//! records follow. The count is validated against the buffer before
//! any key is sliced.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};
use crate::tc::action::{Action, marshal_actions, unmarshal_actions};
use crate::tc::police::Police;

mod tca_u32 {
    pub const CLASSID: u16 = 1;
    pub const HASH: u16 = 2;
    pub const LINK: u16 = 3;
    pub const DIVISOR: u16 = 4;
    pub const SEL: u16 = 5;
    pub const POLICE: u16 = 6;
    pub const ACT: u16 = 7;
    pub const INDEV: u16 = 8;
    pub const PCNT: u16 = 9;
    pub const MARK: u16 = 10;
    pub const FLAGS: u16 = 11;
    pub const PAD: u16 = 12;
}

/// One match key (mirrors struct tc_u32_key).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct U32Key {
    pub mask: u32,
    pub val: u32,
    pub off: u32,
    pub offmask: u32,
}

impl U32Key {
    pub const SIZE: usize = 16;

    fn write(&self, w: &mut RecordWriter) {
        w.u32(self.mask);
        w.u32(self.val);
        w.u32(self.off);
        w.u32(self.offmask);
    }

    fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "u32 key", endian)?;
        Ok(Self {
            mask: r.u32(),
            val: r.u32(),
            off: r.u32(),
            offmask: r.u32(),
        })
    }
}

/// Packet selector: packed header plus `nkeys` trailing key records
/// (mirrors struct tc_u32_sel).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct U32Sel {
    pub flags: u8,
    pub offshift: u8,
    pub offmask: u16,
    pub off: u16,
    pub offoff: u16,
    pub hoff: u16,
    pub hmask: u32,
    pub keys: Vec<U32Key>,
}

impl U32Sel {
    /// Packed header size, before the trailing key array.
    pub const HEADER_SIZE: usize = 15;

    /// Serialize header and keys. The emitted key count is the length
    /// of `keys`, so the two can never disagree on the wire.
    pub fn marshal(&self, endian: Endian) -> Result<Vec<u8>> {
        if self.keys.len() > u8::MAX as usize {
            return Err(Error::InvalidAttribute(format!(
                "u32 selector: too many keys: {}",
                self.keys.len()
            )));
        }
        let mut w =
            RecordWriter::with_capacity(endian, Self::HEADER_SIZE + self.keys.len() * U32Key::SIZE);
        w.u8(self.flags);
        w.u8(self.offshift);
        w.u8(self.keys.len() as u8);
        w.u16(self.offmask);
        w.u16(self.off);
        w.u16(self.offoff);
        w.u16(self.hoff);
        w.u32(self.hmask);
        for key in &self.keys {
            key.write(&mut w);
        }
        Ok(w.finish())
    }

    /// Deserialize, validating the declared key count against the
    /// available bytes before slicing any key.
    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::InsufficientBytes {
                what: "u32 selector header",
                expected: Self::HEADER_SIZE,
                actual: data.len(),
            });
        }
        let mut r = RecordReader::prefix(data, Self::HEADER_SIZE, "u32 selector header", endian)?;
        let flags = r.u8();
        let offshift = r.u8();
        let nkeys = r.u8() as usize;
        let mut sel = U32Sel {
            flags,
            offshift,
            offmask: r.u16(),
            off: r.u16(),
            offoff: r.u16(),
            hoff: r.u16(),
            hmask: r.u32(),
            keys: Vec::with_capacity(nkeys),
        };

        let required = Self::HEADER_SIZE + nkeys * U32Key::SIZE;
        if data.len() < required {
            return Err(Error::InsufficientBytes {
                what: "u32 selector keys",
                expected: required,
                actual: data.len(),
            });
        }
        for i in 0..nkeys {
            let start = Self::HEADER_SIZE + i * U32Key::SIZE;
            sel.keys
                .push(U32Key::unmarshal(&data[start..start + U32Key::SIZE], endian)?);
        }
        Ok(sel)
    }
}

/// Fwmark match (mirrors struct tc_u32_mark).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct U32Mark {
    pub val: u32,
    pub mask: u32,
    pub success: u32,
}

impl U32Mark {
    pub const SIZE: usize = 12;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.val);
        w.u32(self.mask);
        w.u32(self.success);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "u32 mark", endian)?;
        Ok(Self {
            val: r.u32(),
            mask: r.u32(),
            success: r.u32(),
        })
    }
}

/// U32 filter payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct U32 {
    pub class_id: Option<u32>,
    pub hash: Option<u32>,
    pub link: Option<u32>,
    pub divisor: Option<u32>,
    pub sel: Option<U32Sel>,
    pub police: Option<Police>,
    pub actions: Option<Vec<Action>>,
    /// Inbound device name match.
    pub indev: Option<String>,
    /// Hit counter reported by the kernel.
    pub pcnt: Option<u64>,
    pub mark: Option<U32Mark>,
    pub flags: Option<u32>,
}

impl U32 {
    pub fn marshal(&self, endian: Endian) -> Result<Vec<u8>> {
        let mut attrs = AttrWriter::new(endian);
        if let Some(sel) = &self.sel {
            attrs.bytes(tca_u32::SEL, &sel.marshal(endian)?);
        }
        if let Some(mark) = &self.mark {
            attrs.bytes(tca_u32::MARK, &mark.marshal(endian));
        }
        if let Some(class_id) = self.class_id {
            attrs.u32(tca_u32::CLASSID, class_id);
        }
        if let Some(hash) = self.hash {
            attrs.u32(tca_u32::HASH, hash);
        }
        if let Some(link) = self.link {
            attrs.u32(tca_u32::LINK, link);
        }
        if let Some(divisor) = self.divisor {
            attrs.u32(tca_u32::DIVISOR, divisor);
        }
        if let Some(indev) = &self.indev {
            attrs.string(tca_u32::INDEV, indev);
        }
        if let Some(pcnt) = self.pcnt {
            attrs.u64(tca_u32::PCNT, pcnt);
        }
        if let Some(police) = &self.police {
            attrs.bytes(tca_u32::POLICE, &police.marshal(endian));
        }
        if let Some(flags) = self.flags {
            attrs.u32(tca_u32::FLAGS, flags);
        }
        if let Some(actions) = &self.actions {
            attrs.bytes(tca_u32::ACT, &marshal_actions(actions, endian));
        }
        Ok(attrs.into_bytes())
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = U32::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_u32::CLASSID => opts.class_id = errs.record(get::u32(payload, endian)),
                tca_u32::HASH => opts.hash = errs.record(get::u32(payload, endian)),
                tca_u32::LINK => opts.link = errs.record(get::u32(payload, endian)),
                tca_u32::DIVISOR => opts.divisor = errs.record(get::u32(payload, endian)),
                tca_u32::SEL => opts.sel = Some(U32Sel::unmarshal(payload, endian)?),
                tca_u32::POLICE => opts.police = Some(Police::unmarshal(payload, endian, errs)?),
                tca_u32::ACT => opts.actions = Some(unmarshal_actions(payload, endian, errs)?),
                tca_u32::INDEV => {
                    opts.indev = errs.record(get::string(payload).map(str::to_string));
                }
                tca_u32::PCNT => opts.pcnt = errs.record(get::u64(payload, endian)),
                tca_u32::MARK => opts.mark = errs.record(U32Mark::unmarshal(payload, endian)),
                tca_u32::FLAGS => opts.flags = errs.record(get::u32(payload, endian)),
                tca_u32::PAD => {}
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "u32",
                        attr_type,
                    });
                }
            }
        }
        Ok(opts)
    }
}
