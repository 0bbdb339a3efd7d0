//! Class-based queueing (cbq) qdisc options.

use crate::netlink::attr::{AttrIter, AttrWriter};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};
use crate::tc::police::RateSpec;

mod tca_cbq {
    pub const LSSOPT: u16 = 1;
    pub const WRROPT: u16 = 2;
    pub const FOPT: u16 = 3;
    pub const OVL_STRATEGY: u16 = 4;
    pub const RATE: u16 = 5;
    pub const RTAB: u16 = 6;
    pub const POLICE: u16 = 7;
}

/// Link-sharing scheduler parameters (mirrors struct tc_cbq_lssopt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CbqLssOpt {
    pub change: u8,
    pub flags: u8,
    /// log(W) for the idle average.
    pub ewma_log: u8,
    pub level: u8,
    pub maxidle: u32,
    pub minidle: u32,
    pub offtime: u32,
    /// Average packet size in bytes.
    pub avpkt: u32,
}

impl CbqLssOpt {
    pub const SIZE: usize = 20;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u8(self.change);
        w.u8(self.flags);
        w.u8(self.ewma_log);
        w.u8(self.level);
        w.u32(self.maxidle);
        w.u32(self.minidle);
        w.u32(self.offtime);
        w.u32(self.avpkt);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "cbq lss opt", endian)?;
        Ok(Self {
            change: r.u8(),
            flags: r.u8(),
            ewma_log: r.u8(),
            level: r.u8(),
            maxidle: r.u32(),
            minidle: r.u32(),
            offtime: r.u32(),
            avpkt: r.u32(),
        })
    }
}

/// Weighted round-robin parameters (mirrors struct tc_cbq_wrropt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CbqWrrOpt {
    pub flags: u8,
    pub priority: u8,
    pub cpriority: u8,
    pub allot: u32,
    pub weight: u32,
}

impl CbqWrrOpt {
    pub const SIZE: usize = 12;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u8(self.flags);
        w.u8(self.priority);
        w.u8(self.cpriority);
        w.pad(1);
        w.u32(self.allot);
        w.u32(self.weight);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "cbq wrr opt", endian)?;
        let flags = r.u8();
        let priority = r.u8();
        let cpriority = r.u8();
        r.skip(1);
        Ok(Self {
            flags,
            priority,
            cpriority,
            allot: r.u32(),
            weight: r.u32(),
        })
    }
}

/// Filter binding parameters (mirrors struct tc_cbq_fopt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CbqFOpt {
    pub split: u32,
    pub defmap: u32,
    pub defchange: u32,
}

impl CbqFOpt {
    pub const SIZE: usize = 12;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.split);
        w.u32(self.defmap);
        w.u32(self.defchange);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "cbq f opt", endian)?;
        Ok(Self {
            split: r.u32(),
            defmap: r.u32(),
            defchange: r.u32(),
        })
    }
}

/// Overlimit strategy (mirrors struct tc_cbq_ovl).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CbqOvl {
    pub strategy: u8,
    pub priority2: u8,
    pub pad: u16,
    pub penalty: u32,
}

impl CbqOvl {
    pub const SIZE: usize = 8;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u8(self.strategy);
        w.u8(self.priority2);
        w.u16(self.pad);
        w.u32(self.penalty);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "cbq ovl", endian)?;
        Ok(Self {
            strategy: r.u8(),
            priority2: r.u8(),
            pad: r.u16(),
            penalty: r.u32(),
        })
    }
}

/// Policing switch (mirrors struct tc_cbq_police).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CbqPolice {
    pub police: u8,
}

impl CbqPolice {
    pub const SIZE: usize = 4;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u8(self.police);
        w.pad(3);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "cbq police", endian)?;
        let police = r.u8();
        r.skip(3);
        Ok(Self { police })
    }
}

/// Cbq discipline payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cbq {
    pub lss_opt: Option<CbqLssOpt>,
    pub wrr_opt: Option<CbqWrrOpt>,
    pub f_opt: Option<CbqFOpt>,
    pub ovl_strategy: Option<CbqOvl>,
    pub rate: Option<RateSpec>,
    /// Rate translation table, passed through verbatim.
    pub rtab: Option<Vec<u8>>,
    pub police: Option<CbqPolice>,
}

impl Cbq {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        if let Some(lss_opt) = &self.lss_opt {
            attrs.bytes(tca_cbq::LSSOPT, &lss_opt.marshal(endian));
        }
        if let Some(wrr_opt) = &self.wrr_opt {
            attrs.bytes(tca_cbq::WRROPT, &wrr_opt.marshal(endian));
        }
        if let Some(f_opt) = &self.f_opt {
            attrs.bytes(tca_cbq::FOPT, &f_opt.marshal(endian));
        }
        if let Some(ovl) = &self.ovl_strategy {
            attrs.bytes(tca_cbq::OVL_STRATEGY, &ovl.marshal(endian));
        }
        if let Some(rate) = &self.rate {
            attrs.bytes(tca_cbq::RATE, &rate.marshal(endian));
        }
        if let Some(rtab) = &self.rtab {
            attrs.bytes(tca_cbq::RTAB, rtab);
        }
        if let Some(police) = &self.police {
            attrs.bytes(tca_cbq::POLICE, &police.marshal(endian));
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = Cbq::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_cbq::LSSOPT => opts.lss_opt = errs.record(CbqLssOpt::unmarshal(payload, endian)),
                tca_cbq::WRROPT => opts.wrr_opt = errs.record(CbqWrrOpt::unmarshal(payload, endian)),
                tca_cbq::FOPT => opts.f_opt = errs.record(CbqFOpt::unmarshal(payload, endian)),
                tca_cbq::OVL_STRATEGY => {
                    opts.ovl_strategy = errs.record(CbqOvl::unmarshal(payload, endian));
                }
                tca_cbq::RATE => opts.rate = errs.record(RateSpec::unmarshal(payload, endian)),
                tca_cbq::RTAB => opts.rtab = Some(payload.to_vec()),
                tca_cbq::POLICE => opts.police = errs.record(CbqPolice::unmarshal(payload, endian)),
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "cbq",
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
        let full = Cbq {
            lss_opt: Some(CbqLssOpt {
                change: 0xFF,
                flags: 2,
                ewma_log: 5,
                level: 1,
                maxidle: 1000,
                minidle: 10,
                offtime: 500,
                avpkt: 1000,
            }),
            wrr_opt: Some(CbqWrrOpt {
                flags: 0,
                priority: 1,
                cpriority: 1,
                allot: 1514,
                weight: 1,
            }),
            f_opt: Some(CbqFOpt {
                split: 0x10000,
                defmap: 0xFFFF,
                defchange: 0xFFFF,
            }),
            ovl_strategy: Some(CbqOvl {
                strategy: 1,
                priority2: 0,
                pad: 0,
                penalty: 1000,
            }),
            rate: Some(RateSpec {
                cell_log: 3,
                rate: 125_000,
                ..Default::default()
            }),
            rtab: Some(vec![0u8; 1024]),
            police: Some(CbqPolice { police: 1 }),
        };

        for opts in [Cbq::default(), full] {
            let mut errs = ErrorList::new();
            let decoded =
                Cbq::unmarshal(&opts.marshal(Endian::native()), Endian::native(), &mut errs)
                    .unwrap();
            assert!(errs.is_empty());
            assert_eq!(decoded, opts);
        }
    }

    #[test]
    fn test_singleton_blocks_round_trip() {
        let variants = [
            Cbq {
                lss_opt: Some(CbqLssOpt::default()),
                ..Default::default()
            },
            Cbq {
                wrr_opt: Some(CbqWrrOpt::default()),
                ..Default::default()
            },
            Cbq {
                ovl_strategy: Some(CbqOvl::default()),
                ..Default::default()
            },
            Cbq {
                police: Some(CbqPolice::default()),
                ..Default::default()
            },
        ];
        for opts in &variants {
            let mut errs = ErrorList::new();
            let decoded =
                Cbq::unmarshal(&opts.marshal(Endian::native()), Endian::native(), &mut errs)
                    .unwrap();
            assert!(errs.is_empty());
            assert_eq!(&decoded, opts);
        }
    }

    #[test]
    fn test_malformed_blocks_aggregate() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.bytes(tca_cbq::LSSOPT, &[0u8; 19]);
        attrs.bytes(tca_cbq::WRROPT, &CbqWrrOpt::default().marshal(Endian::native()));
        attrs.bytes(tca_cbq::OVL_STRATEGY, &[0u8; 3]);

        let mut errs = ErrorList::new();
        let opts = Cbq::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs).unwrap();
        assert_eq!(errs.len(), 2);
        assert_eq!(opts.lss_opt, None);
        assert_eq!(opts.ovl_strategy, None);
        assert_eq!(opts.wrr_opt, Some(CbqWrrOpt::default()));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.u32(8, 1);
        let mut errs = ErrorList::new();
        assert!(matches!(
            Cbq::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs),
            Err(Error::UnknownAttribute {
                schema: "cbq",
                attr_type: 8,
            })
        ));
    }
}
