//! Network emulation (netem) qdisc options.
//!
//! The options payload is a mandatory fixed qopt record followed by a
//! TLV stream of optional blocks. Absence of a block is meaningful: a
//! zero-valued correlation block configures zero correlation, while an
//! absent one leaves the kernel default in place.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};

mod tca_netem {
    pub const CORR: u16 = 1;
    pub const REORDER: u16 = 3;
    pub const CORRUPT: u16 = 4;
    pub const LOSS: u16 = 5;
    pub const RATE: u16 = 6;
    pub const ECN: u16 = 7;
    pub const RATE64: u16 = 8;
    pub const PAD: u16 = 9;
    pub const LATENCY64: u16 = 10;
    pub const JITTER64: u16 = 11;
    pub const SLOT: u16 = 12;
}

mod netem_loss {
    pub const GI: u16 = 1;
    pub const GE: u16 = 2;
}

/// Mandatory netem options record (mirrors struct tc_netem_qopt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemQopt {
    /// Added delay in ticks.
    pub latency: u32,
    /// FIFO limit in packets.
    pub limit: u32,
    /// Random packet loss (0 = none, !0 scaled to u32 max).
    pub loss: u32,
    /// Re-ordering gap (0 for none).
    pub gap: u32,
    /// Random packet duplication.
    pub duplicate: u32,
    /// Random jitter in ticks.
    pub jitter: u32,
}

impl NetemQopt {
    pub const SIZE: usize = 24;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.latency);
        w.u32(self.limit);
        w.u32(self.loss);
        w.u32(self.gap);
        w.u32(self.duplicate);
        w.u32(self.jitter);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem qopt", endian)?;
        Ok(Self {
            latency: r.u32(),
            limit: r.u32(),
            loss: r.u32(),
            gap: r.u32(),
            duplicate: r.u32(),
            jitter: r.u32(),
        })
    }
}

/// Correlation percentages for delay, loss, and duplication
/// (mirrors struct tc_netem_corr).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemCorr {
    pub delay: u32,
    pub loss: u32,
    pub dup: u32,
}

impl NetemCorr {
    pub const SIZE: usize = 12;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.delay);
        w.u32(self.loss);
        w.u32(self.dup);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem corr", endian)?;
        Ok(Self {
            delay: r.u32(),
            loss: r.u32(),
            dup: r.u32(),
        })
    }
}

/// Re-ordering probability (mirrors struct tc_netem_reorder).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemReorder {
    pub probability: u32,
    pub correlation: u32,
}

impl NetemReorder {
    pub const SIZE: usize = 8;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.probability);
        w.u32(self.correlation);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem reorder", endian)?;
        Ok(Self {
            probability: r.u32(),
            correlation: r.u32(),
        })
    }
}

/// Corruption probability (mirrors struct tc_netem_corrupt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemCorrupt {
    pub probability: u32,
    pub correlation: u32,
}

impl NetemCorrupt {
    pub const SIZE: usize = 8;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.probability);
        w.u32(self.correlation);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem corrupt", endian)?;
        Ok(Self {
            probability: r.u32(),
            correlation: r.u32(),
        })
    }
}

/// Rate limiting parameters (mirrors struct tc_netem_rate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemRate {
    /// Rate in bytes per second.
    pub rate: u32,
    pub packet_overhead: i32,
    pub cell_size: i32,
    pub cell_overhead: i32,
}

impl NetemRate {
    pub const SIZE: usize = 16;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.rate);
        w.i32(self.packet_overhead);
        w.i32(self.cell_size);
        w.i32(self.cell_overhead);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem rate", endian)?;
        Ok(Self {
            rate: r.u32(),
            packet_overhead: r.i32(),
            cell_size: r.i32(),
            cell_overhead: r.i32(),
        })
    }
}

/// Slotting parameters (mirrors struct tc_netem_slot).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemSlot {
    pub min_delay: i64,
    pub max_delay: i64,
    pub max_packets: i32,
    pub max_bytes: i32,
    pub dist_delay: i64,
    pub dist_jitter: i64,
}

impl NetemSlot {
    pub const SIZE: usize = 40;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.i64(self.min_delay);
        w.i64(self.max_delay);
        w.i32(self.max_packets);
        w.i32(self.max_bytes);
        w.i64(self.dist_delay);
        w.i64(self.dist_jitter);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem slot", endian)?;
        Ok(Self {
            min_delay: r.i64(),
            max_delay: r.i64(),
            max_packets: r.i32(),
            max_bytes: r.i32(),
            dist_delay: r.i64(),
            dist_jitter: r.i64(),
        })
    }
}

/// 4-state Markov loss model (mirrors struct tc_netem_gimodel).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemGiModel {
    pub p13: u32,
    pub p31: u32,
    pub p32: u32,
    pub p14: u32,
    pub p23: u32,
}

impl NetemGiModel {
    pub const SIZE: usize = 20;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.p13);
        w.u32(self.p31);
        w.u32(self.p32);
        w.u32(self.p14);
        w.u32(self.p23);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem gi model", endian)?;
        Ok(Self {
            p13: r.u32(),
            p31: r.u32(),
            p32: r.u32(),
            p14: r.u32(),
            p23: r.u32(),
        })
    }
}

/// Gilbert-Elliot loss model (mirrors struct tc_netem_gemodel).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemGeModel {
    pub p: u32,
    pub r: u32,
    pub h: u32,
    pub k1: u32,
}

impl NetemGeModel {
    pub const SIZE: usize = 16;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.p);
        w.u32(self.r);
        w.u32(self.h);
        w.u32(self.k1);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "netem ge model", endian)?;
        Ok(Self {
            p: r.u32(),
            r: r.u32(),
            h: r.u32(),
            k1: r.u32(),
        })
    }
}

/// Loss model carried in the nested loss attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetemLoss {
    Gi(NetemGiModel),
    Ge(NetemGeModel),
}

impl NetemLoss {
    fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        match self {
            NetemLoss::Gi(model) => attrs.bytes(netem_loss::GI, &model.marshal(endian)),
            NetemLoss::Ge(model) => attrs.bytes(netem_loss::GE, &model.marshal(endian)),
        }
        attrs.into_bytes()
    }

    fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut loss = None;
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                netem_loss::GI => {
                    loss = Some(NetemLoss::Gi(NetemGiModel::unmarshal(payload, endian)?));
                }
                netem_loss::GE => {
                    loss = Some(NetemLoss::Ge(NetemGeModel::unmarshal(payload, endian)?));
                }
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "netem loss",
                        attr_type,
                    });
                }
            }
        }
        loss.ok_or_else(|| Error::InvalidAttribute("netem loss without model".into()))
    }
}

/// Netem discipline payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netem {
    /// Mandatory fixed options record.
    pub qopt: NetemQopt,
    pub corr: Option<NetemCorr>,
    pub reorder: Option<NetemReorder>,
    pub corrupt: Option<NetemCorrupt>,
    pub loss: Option<NetemLoss>,
    pub rate: Option<NetemRate>,
    /// ECN marking instead of dropping (0 or 1).
    pub ecn: Option<u32>,
    /// Rate in bytes per second when it exceeds the 32-bit rate field.
    pub rate64: Option<u64>,
    /// Added delay in nanoseconds, overriding the tick-based latency.
    pub latency64: Option<i64>,
    /// Jitter in nanoseconds, overriding the tick-based jitter.
    pub jitter64: Option<i64>,
    pub slot: Option<NetemSlot>,
}

impl Netem {
    /// Serialize to the options payload: qopt prefix then TLV attributes.
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut buf = self.qopt.marshal(endian);
        let mut attrs = AttrWriter::new(endian);
        if let Some(corr) = &self.corr {
            attrs.bytes(tca_netem::CORR, &corr.marshal(endian));
        }
        if let Some(reorder) = &self.reorder {
            attrs.bytes(tca_netem::REORDER, &reorder.marshal(endian));
        }
        if let Some(corrupt) = &self.corrupt {
            attrs.bytes(tca_netem::CORRUPT, &corrupt.marshal(endian));
        }
        if let Some(loss) = &self.loss {
            attrs.bytes(tca_netem::LOSS, &loss.marshal(endian));
        }
        if let Some(rate) = &self.rate {
            attrs.bytes(tca_netem::RATE, &rate.marshal(endian));
        }
        if let Some(ecn) = self.ecn {
            attrs.u32(tca_netem::ECN, ecn);
        }
        if let Some(rate64) = self.rate64 {
            attrs.u64(tca_netem::RATE64, rate64);
        }
        if let Some(latency64) = self.latency64 {
            attrs.i64(tca_netem::LATENCY64, latency64);
        }
        if let Some(jitter64) = self.jitter64 {
            attrs.i64(tca_netem::JITTER64, jitter64);
        }
        if let Some(slot) = &self.slot {
            attrs.bytes(tca_netem::SLOT, &slot.marshal(endian));
        }
        buf.extend_from_slice(&attrs.into_bytes());
        buf
    }

    /// Deserialize from the options payload.
    ///
    /// Malformed optional blocks are pushed onto `errs` and decoding
    /// continues; a short qopt prefix or an unknown attribute type
    /// aborts immediately.
    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        if data.len() < NetemQopt::SIZE {
            return Err(Error::InsufficientBytes {
                what: "netem qopt",
                expected: NetemQopt::SIZE,
                actual: data.len(),
            });
        }
        let qopt = NetemQopt::unmarshal(&data[..NetemQopt::SIZE], endian)?;
        let mut netem = Netem {
            qopt,
            ..Default::default()
        };

        for (attr_type, payload) in AttrIter::new(&data[NetemQopt::SIZE..], endian) {
            match attr_type {
                tca_netem::CORR => netem.corr = errs.record(NetemCorr::unmarshal(payload, endian)),
                tca_netem::REORDER => {
                    netem.reorder = errs.record(NetemReorder::unmarshal(payload, endian));
                }
                tca_netem::CORRUPT => {
                    netem.corrupt = errs.record(NetemCorrupt::unmarshal(payload, endian));
                }
                tca_netem::LOSS => netem.loss = errs.record(NetemLoss::unmarshal(payload, endian)),
                tca_netem::RATE => netem.rate = errs.record(NetemRate::unmarshal(payload, endian)),
                tca_netem::ECN => netem.ecn = errs.record(get::u32(payload, endian)),
                tca_netem::RATE64 => netem.rate64 = errs.record(get::u64(payload, endian)),
                tca_netem::LATENCY64 => netem.latency64 = errs.record(get::i64(payload, endian)),
                tca_netem::JITTER64 => netem.jitter64 = errs.record(get::i64(payload, endian)),
                tca_netem::SLOT => netem.slot = errs.record(NetemSlot::unmarshal(payload, endian)),
                tca_netem::PAD => {}
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "netem",
                        attr_type,
                    });
                }
            }
        }

        Ok(netem)
    }
}
