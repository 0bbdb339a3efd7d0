//! Policing sub-schema shared across filter and qdisc modules.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};

mod tca_police {
    pub const TBF: u16 = 1;
    pub const RATE: u16 = 2;
    pub const PEAKRATE: u16 = 3;
    pub const AVRATE: u16 = 4;
    pub const RESULT: u16 = 5;
    pub const TM: u16 = 6;
    pub const PAD: u16 = 7;
    pub const RATE64: u16 = 8;
    pub const PEAKRATE64: u16 = 9;
}

/// Rate description embedded in policing and shaping records
/// (mirrors struct tc_ratespec).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSpec {
    pub cell_log: u8,
    pub linklayer: u8,
    pub overhead: u16,
    pub cell_align: i16,
    pub mpu: u16,
    /// Rate in bytes per second.
    pub rate: u32,
}

impl RateSpec {
    pub const SIZE: usize = 12;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u8(self.cell_log);
        w.u8(self.linklayer);
        w.u16(self.overhead);
        w.i16(self.cell_align);
        w.u16(self.mpu);
        w.u32(self.rate);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "ratespec", endian)?;
        Ok(Self {
            cell_log: r.u8(),
            linklayer: r.u8(),
            overhead: r.u16(),
            cell_align: r.i16(),
            mpu: r.u16(),
            rate: r.u32(),
        })
    }

    /// Decode from an already-validated reader, for records that embed
    /// a ratespec mid-struct.
    fn read(r: &mut RecordReader<'_>) -> Self {
        Self {
            cell_log: r.u8(),
            linklayer: r.u8(),
            overhead: r.u16(),
            cell_align: r.i16(),
            mpu: r.u16(),
            rate: r.u32(),
        }
    }

    fn write(&self, w: &mut RecordWriter) {
        w.u8(self.cell_log);
        w.u8(self.linklayer);
        w.u16(self.overhead);
        w.i16(self.cell_align);
        w.u16(self.mpu);
        w.u32(self.rate);
    }
}

/// Token-bucket policing record (mirrors struct tc_police).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcPolice {
    pub index: u32,
    /// Verdict applied when the policer fires.
    pub action: i32,
    /// Burst allowance in bytes.
    pub limit: u32,
    pub burst: u32,
    pub mtu: u32,
    pub rate: RateSpec,
    pub peakrate: RateSpec,
    pub refcnt: i32,
    pub bindcnt: i32,
    pub capab: u32,
}

impl TcPolice {
    pub const SIZE: usize = 56;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.index);
        w.i32(self.action);
        w.u32(self.limit);
        w.u32(self.burst);
        w.u32(self.mtu);
        self.rate.write(&mut w);
        self.peakrate.write(&mut w);
        w.i32(self.refcnt);
        w.i32(self.bindcnt);
        w.u32(self.capab);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "tc police", endian)?;
        Ok(Self {
            index: r.u32(),
            action: r.i32(),
            limit: r.u32(),
            burst: r.u32(),
            mtu: r.u32(),
            rate: RateSpec::read(&mut r),
            peakrate: RateSpec::read(&mut r),
            refcnt: r.i32(),
            bindcnt: r.i32(),
            capab: r.u32(),
        })
    }
}

/// Policing block carried under a filter's police attribute.
///
/// The kernel-side rate tables (types 2 and 3) are request-only input
/// computed by userspace; they are skipped on decode and not modeled.
/// Timestamps (type 6) are likewise skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Police {
    pub tbf: Option<TcPolice>,
    /// Average rate estimator bound in bytes per second.
    pub av_rate: Option<u32>,
    /// Verdict returned for in-profile packets.
    pub result: Option<u32>,
    pub rate64: Option<u64>,
    pub peak_rate64: Option<u64>,
}

impl Police {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        if let Some(tbf) = &self.tbf {
            attrs.bytes(tca_police::TBF, &tbf.marshal(endian));
        }
        if let Some(av_rate) = self.av_rate {
            attrs.u32(tca_police::AVRATE, av_rate);
        }
        if let Some(result) = self.result {
            attrs.u32(tca_police::RESULT, result);
        }
        if let Some(rate64) = self.rate64 {
            attrs.u64(tca_police::RATE64, rate64);
        }
        if let Some(peak_rate64) = self.peak_rate64 {
            attrs.u64(tca_police::PEAKRATE64, peak_rate64);
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut police = Police::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_police::TBF => police.tbf = errs.record(TcPolice::unmarshal(payload, endian)),
                tca_police::AVRATE => police.av_rate = errs.record(get::u32(payload, endian)),
                tca_police::RESULT => police.result = errs.record(get::u32(payload, endian)),
                tca_police::RATE64 => police.rate64 = errs.record(get::u64(payload, endian)),
                tca_police::PEAKRATE64 => {
                    police.peak_rate64 = errs.record(get::u64(payload, endian));
                }
                tca_police::RATE | tca_police::PEAKRATE | tca_police::TM | tca_police::PAD => {}
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "police",
                        attr_type,
                    });
                }
            }
        }
        Ok(police)
    }
}
