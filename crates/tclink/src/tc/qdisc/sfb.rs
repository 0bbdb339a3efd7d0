//! Stochastic fair blue (sfb) qdisc options.

use crate::netlink::attr::{AttrIter, AttrWriter};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};

mod tca_sfb {
    pub const PARMS: u16 = 1;
}

/// Fixed sfb parameter record (mirrors struct tc_sfb_qopt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfbQopt {
    /// Hash rehash interval in milliseconds.
    pub rehash_interval: u32,
    /// Double-buffering warmup time in milliseconds.
    pub warmup_time: u32,
    /// Maximum queue length in packets.
    pub max: u32,
    pub bin_size: u32,
    /// Marking-probability increment.
    pub increment: u32,
    /// Marking-probability decrement.
    pub decrement: u32,
    /// Hard queue limit in packets.
    pub limit: u32,
    pub penalty_rate: u32,
    pub penalty_burst: u32,
}

impl SfbQopt {
    pub const SIZE: usize = 36;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.rehash_interval);
        w.u32(self.warmup_time);
        w.u32(self.max);
        w.u32(self.bin_size);
        w.u32(self.increment);
        w.u32(self.decrement);
        w.u32(self.limit);
        w.u32(self.penalty_rate);
        w.u32(self.penalty_burst);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "sfb qopt", endian)?;
        Ok(Self {
            rehash_interval: r.u32(),
            warmup_time: r.u32(),
            max: r.u32(),
            bin_size: r.u32(),
            increment: r.u32(),
            decrement: r.u32(),
            limit: r.u32(),
            penalty_rate: r.u32(),
            penalty_burst: r.u32(),
        })
    }
}

/// Sfb discipline payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sfb {
    pub parms: Option<SfbQopt>,
}

impl Sfb {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        if let Some(parms) = &self.parms {
            attrs.bytes(tca_sfb::PARMS, &parms.marshal(endian));
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = Sfb::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_sfb::PARMS => opts.parms = errs.record(SfbQopt::unmarshal(payload, endian)),
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "sfb",
                        attr_type,
                    });
                }
            }
        }
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let variants = [
            Sfb::default(),
            Sfb {
                parms: Some(SfbQopt {
                    rehash_interval: 600_000,
                    warmup_time: 60_000,
                    max: 25,
                    bin_size: 20,
                    increment: 328,
                    decrement: 65,
                    limit: 1000,
                    penalty_rate: 10,
                    penalty_burst: 20,
                }),
            },
            Sfb {
                parms: Some(SfbQopt::default()),
            },
        ];
        for opts in variants {
            let mut errs = ErrorList::new();
            let decoded =
                Sfb::unmarshal(&opts.marshal(Endian::native()), Endian::native(), &mut errs)
                    .unwrap();
            assert!(errs.is_empty());
            assert_eq!(decoded, opts);
        }
    }

    #[test]
    fn test_wrong_parms_size_aggregates() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.bytes(tca_sfb::PARMS, &[0u8; 35]);
        let mut errs = ErrorList::new();
        let opts = Sfb::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs).unwrap();
        assert_eq!(opts.parms, None);
        assert_eq!(errs.len(), 1);
        assert!(errs.into_result().unwrap_err().to_string().contains("sfb qopt"));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.u32(2, 1);
        let mut errs = ErrorList::new();
        assert!(matches!(
            Sfb::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs),
            Err(Error::UnknownAttribute {
                schema: "sfb",
                attr_type: 2,
            })
        ));
    }
}
