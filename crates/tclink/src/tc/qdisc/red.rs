//! Random early detection (red) qdisc options.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};

mod tca_red {
    pub const PARMS: u16 = 1;
    pub const STAB: u16 = 2;
    pub const MAX_P: u16 = 3;
}

/// Fixed red parameter record (mirrors struct tc_red_qopt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedQopt {
    /// Hard queue limit in bytes.
    pub limit: u32,
    /// Minimum average-queue threshold in bytes.
    pub qth_min: u32,
    /// Maximum average-queue threshold in bytes.
    pub qth_max: u32,
    /// log(W) for the moving average.
    pub w_log: u8,
    /// log(P_max / (qth_max - qth_min)).
    pub p_log: u8,
    /// Cell size for idle-time calculation.
    pub scell_log: u8,
    pub flags: u8,
}

impl RedQopt {
    pub const SIZE: usize = 16;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.limit);
        w.u32(self.qth_min);
        w.u32(self.qth_max);
        w.u8(self.w_log);
        w.u8(self.p_log);
        w.u8(self.scell_log);
        w.u8(self.flags);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "red qopt", endian)?;
        Ok(Self {
            limit: r.u32(),
            qth_min: r.u32(),
            qth_max: r.u32(),
            w_log: r.u8(),
            p_log: r.u8(),
            scell_log: r.u8(),
            flags: r.u8(),
        })
    }
}

/// Red discipline payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Red {
    pub parms: Option<RedQopt>,
    /// Idle-time scaling table, passed through verbatim.
    pub stab: Option<Vec<u8>>,
    /// Maximum marking probability scaled to u32 max.
    pub max_p: Option<u32>,
}

impl Red {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        if let Some(parms) = &self.parms {
            attrs.bytes(tca_red::PARMS, &parms.marshal(endian));
        }
        if let Some(stab) = &self.stab {
            attrs.bytes(tca_red::STAB, stab);
        }
        if let Some(max_p) = self.max_p {
            attrs.u32(tca_red::MAX_P, max_p);
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = Red::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_red::PARMS => opts.parms = errs.record(RedQopt::unmarshal(payload, endian)),
                tca_red::STAB => opts.stab = Some(payload.to_vec()),
                tca_red::MAX_P => opts.max_p = errs.record(get::u32(payload, endian)),
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "red",
                        attr_type,
                    });
                }
            }
        }
        Ok(opts)
    }
}
