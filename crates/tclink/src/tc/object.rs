//! Typed view of one qdisc, class or filter message.
//!
//! The envelope after the fixed tc header is a TLV stream carrying the
//! discipline kind, its option payload and kernel-emitted statistics.
//! Option payloads are dispatched on the kind string into typed
//! schemas; kinds without a schema are carried verbatim so a dump can
//! be re-encoded without loss.

use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader};
use crate::tc::filter::U32;
use crate::tc::msg::TcMsg;
use crate::tc::qdisc::{Cbq, Codel, FqCodel, Hhf, Netem, Pie, Red, Sfb};

mod tca {
    pub const KIND: u16 = 1;
    pub const OPTIONS: u16 = 2;
    pub const STATS: u16 = 3;
    pub const XSTATS: u16 = 4;
    pub const RATE: u16 = 5;
    pub const FCNT: u16 = 6;
    pub const STATS2: u16 = 7;
    pub const STAB: u16 = 8;
    pub const PAD: u16 = 9;
    pub const DUMP_INVISIBLE: u16 = 10;
    pub const CHAIN: u16 = 11;
    pub const HW_OFFLOAD: u16 = 12;
    pub const INGRESS_BLOCK: u16 = 13;
    pub const EGRESS_BLOCK: u16 = 14;
    pub const DUMP_FLAGS: u16 = 15;
    pub const EXT_WARN_MSG: u16 = 16;
}

mod tca_stats2 {
    pub const BASIC: u16 = 1;
    pub const RATE_EST: u16 = 2;
    pub const QUEUE: u16 = 3;
    pub const APP: u16 = 4;
}

/// Legacy combined statistics (mirrors struct tc_stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcStats {
    pub bytes: u64,
    pub packets: u32,
    pub drops: u32,
    pub overlimits: u32,
    pub bps: u32,
    pub pps: u32,
    pub qlen: u32,
    pub backlog: u32,
}

impl TcStats {
    pub const SIZE: usize = 36;

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::prefix(data, Self::SIZE, "tc stats", endian)?;
        Ok(Self {
            bytes: r.u64(),
            packets: r.u32(),
            drops: r.u32(),
            overlimits: r.u32(),
            bps: r.u32(),
            pps: r.u32(),
            qlen: r.u32(),
            backlog: r.u32(),
        })
    }
}

/// Byte and packet counters (mirrors struct gnet_stats_basic).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsBasic {
    pub bytes: u64,
    pub packets: u32,
}

impl StatsBasic {
    pub const SIZE: usize = 12;

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::prefix(data, Self::SIZE, "basic stats", endian)?;
        Ok(Self {
            bytes: r.u64(),
            packets: r.u32(),
        })
    }
}

/// Queue counters (mirrors struct gnet_stats_queue).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsQueue {
    pub qlen: u32,
    pub backlog: u32,
    pub drops: u32,
    pub requeues: u32,
    pub overlimits: u32,
}

impl StatsQueue {
    pub const SIZE: usize = 20;

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::prefix(data, Self::SIZE, "queue stats", endian)?;
        Ok(Self {
            qlen: r.u32(),
            backlog: r.u32(),
            drops: r.u32(),
            requeues: r.u32(),
            overlimits: r.u32(),
        })
    }
}

/// Rate estimator output (mirrors struct gnet_stats_rate_est).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRateEst {
    pub bps: u32,
    pub pps: u32,
}

impl StatsRateEst {
    pub const SIZE: usize = 8;

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::prefix(data, Self::SIZE, "rate estimator", endian)?;
        Ok(Self {
            bps: r.u32(),
            pps: r.u32(),
        })
    }
}

/// Nested statistics container (TCA_STATS2).
///
/// The kernel owns this block, so codes without a typed field are
/// skipped rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcStats2 {
    pub basic: Option<StatsBasic>,
    pub rate_est: Option<StatsRateEst>,
    pub queue: Option<StatsQueue>,
    /// Discipline-specific statistics, carried verbatim.
    pub app: Option<Vec<u8>>,
}

impl TcStats2 {
    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Self {
        let mut stats = TcStats2::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_stats2::BASIC => {
                    stats.basic = errs.record(StatsBasic::unmarshal(payload, endian));
                }
                tca_stats2::RATE_EST => {
                    stats.rate_est = errs.record(StatsRateEst::unmarshal(payload, endian));
                }
                tca_stats2::QUEUE => {
                    stats.queue = errs.record(StatsQueue::unmarshal(payload, endian));
                }
                tca_stats2::APP => stats.app = Some(payload.to_vec()),
                _ => {}
            }
        }
        stats
    }
}

/// Discipline payload, dispatched on the kind string.
#[derive(Debug, Clone, PartialEq)]
pub enum TcOptions {
    Netem(Netem),
    FqCodel(FqCodel),
    Red(Red),
    Sfb(Sfb),
    Cbq(Cbq),
    Codel(Codel),
    Hhf(Hhf),
    Pie(Pie),
    U32(U32),
    /// A kind that carries no option payload (clsact, ingress, mq, ...).
    KindOnly { kind: String },
    /// A kind without a typed schema, its payload carried verbatim.
    Raw { kind: String, options: Vec<u8> },
}

impl TcOptions {
    /// The kind string sent on the wire.
    pub fn kind(&self) -> &str {
        match self {
            TcOptions::Netem(_) => "netem",
            TcOptions::FqCodel(_) => "fq_codel",
            TcOptions::Red(_) => "red",
            TcOptions::Sfb(_) => "sfb",
            TcOptions::Cbq(_) => "cbq",
            TcOptions::Codel(_) => "codel",
            TcOptions::Hhf(_) => "hhf",
            TcOptions::Pie(_) => "pie",
            TcOptions::U32(_) => "u32",
            TcOptions::KindOnly { kind } => kind,
            TcOptions::Raw { kind, .. } => kind,
        }
    }

    /// Serialize the option payload; `None` when the kind carries none.
    pub fn marshal(&self, endian: Endian) -> Result<Option<Vec<u8>>> {
        Ok(match self {
            TcOptions::Netem(opts) => Some(opts.marshal(endian)),
            TcOptions::FqCodel(opts) => Some(opts.marshal(endian)),
            TcOptions::Red(opts) => Some(opts.marshal(endian)),
            TcOptions::Sfb(opts) => Some(opts.marshal(endian)),
            TcOptions::Cbq(opts) => Some(opts.marshal(endian)),
            TcOptions::Codel(opts) => Some(opts.marshal(endian)),
            TcOptions::Hhf(opts) => Some(opts.marshal(endian)),
            TcOptions::Pie(opts) => Some(opts.marshal(endian)),
            TcOptions::U32(opts) => Some(opts.marshal(endian)?),
            TcOptions::KindOnly { .. } => None,
            TcOptions::Raw { options, .. } => Some(options.clone()),
        })
    }

    fn unmarshal(
        kind: &str,
        options: Option<&[u8]>,
        endian: Endian,
        errs: &mut ErrorList,
    ) -> Result<Self> {
        let Some(data) = options else {
            return Ok(TcOptions::KindOnly {
                kind: kind.to_string(),
            });
        };
        Ok(match kind {
            "netem" => TcOptions::Netem(Netem::unmarshal(data, endian, errs)?),
            "fq_codel" => TcOptions::FqCodel(FqCodel::unmarshal(data, endian, errs)?),
            "red" => TcOptions::Red(Red::unmarshal(data, endian, errs)?),
            "sfb" => TcOptions::Sfb(Sfb::unmarshal(data, endian, errs)?),
            "cbq" => TcOptions::Cbq(Cbq::unmarshal(data, endian, errs)?),
            "codel" => TcOptions::Codel(Codel::unmarshal(data, endian, errs)?),
            "hhf" => TcOptions::Hhf(Hhf::unmarshal(data, endian, errs)?),
            "pie" => TcOptions::Pie(Pie::unmarshal(data, endian, errs)?),
            "u32" => TcOptions::U32(U32::unmarshal(data, endian, errs)?),
            _ => TcOptions::Raw {
                kind: kind.to_string(),
                options: data.to_vec(),
            },
        })
    }
}

/// Envelope attributes of one tc message.
#[derive(Debug, Clone, PartialEq)]
pub struct TcAttribute {
    pub options: TcOptions,
    /// Legacy combined statistics.
    pub stats: Option<TcStats>,
    pub stats2: Option<TcStats2>,
    /// Discipline-specific extended statistics, carried verbatim.
    pub xstats: Option<Vec<u8>>,
    pub hw_offload: Option<u8>,
    pub chain: Option<u32>,
    pub ingress_block: Option<u32>,
    pub egress_block: Option<u32>,
}

impl TcAttribute {
    pub fn new(options: TcOptions) -> Self {
        Self {
            options,
            stats: None,
            stats2: None,
            xstats: None,
            hw_offload: None,
            chain: None,
            ingress_block: None,
            egress_block: None,
        }
    }
}

/// One qdisc, class or filter: the fixed header plus its envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct TcObject {
    pub msg: TcMsg,
    pub attribute: TcAttribute,
}

impl TcObject {
    pub fn new(msg: TcMsg, options: TcOptions) -> Self {
        Self {
            msg,
            attribute: TcAttribute::new(options),
        }
    }

    /// Append the tc header and request attributes to a message under
    /// construction. Statistics fields are kernel output and never
    /// encoded.
    pub fn encode_into(&self, builder: &mut MessageBuilder, endian: Endian) -> Result<()> {
        let kind = self.attribute.options.kind();
        if kind.is_empty() {
            return Err(Error::InvalidMessage("tc object without kind".into()));
        }
        builder.append_bytes(&self.msg.marshal(endian));
        builder.append_attr_str(tca::KIND, kind);
        if let Some(options) = self.attribute.options.marshal(endian)? {
            builder.append_attr(tca::OPTIONS, &options);
        }
        if let Some(chain) = self.attribute.chain {
            builder.append_attr_u32(tca::CHAIN, chain);
        }
        if let Some(block) = self.attribute.ingress_block {
            builder.append_attr_u32(tca::INGRESS_BLOCK, block);
        }
        if let Some(block) = self.attribute.egress_block {
            builder.append_attr_u32(tca::EGRESS_BLOCK, block);
        }
        Ok(())
    }

    /// Decode one message payload (tc header plus envelope).
    ///
    /// Attribute-level decode failures are pushed onto `errs`; only a
    /// short header, a missing kind or an unknown envelope code abort.
    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        if data.len() < TcMsg::SIZE {
            return Err(Error::InsufficientBytes {
                what: "tc header",
                expected: TcMsg::SIZE,
                actual: data.len(),
            });
        }
        let msg = TcMsg::unmarshal(&data[..TcMsg::SIZE], endian)?;

        let mut kind: Option<String> = None;
        let mut options: Option<&[u8]> = None;
        let mut attribute = TcAttribute::new(TcOptions::KindOnly {
            kind: String::new(),
        });
        for (attr_type, payload) in AttrIter::new(&data[TcMsg::SIZE..], endian) {
            match attr_type {
                tca::KIND => kind = errs.record(get::string(payload).map(str::to_string)),
                tca::OPTIONS => options = Some(payload),
                tca::STATS => {
                    attribute.stats = errs.record(TcStats::unmarshal(payload, endian));
                }
                tca::STATS2 => {
                    attribute.stats2 = Some(TcStats2::unmarshal(payload, endian, errs));
                }
                tca::XSTATS => attribute.xstats = Some(payload.to_vec()),
                tca::HW_OFFLOAD => {
                    attribute.hw_offload = errs.record(get::u8(payload));
                }
                tca::CHAIN => attribute.chain = errs.record(get::u32(payload, endian)),
                tca::INGRESS_BLOCK => {
                    attribute.ingress_block = errs.record(get::u32(payload, endian));
                }
                tca::EGRESS_BLOCK => {
                    attribute.egress_block = errs.record(get::u32(payload, endian));
                }
                tca::RATE
                | tca::FCNT
                | tca::STAB
                | tca::PAD
                | tca::DUMP_INVISIBLE
                | tca::DUMP_FLAGS
                | tca::EXT_WARN_MSG => {}
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "tc",
                        attr_type,
                    });
                }
            }
        }

        let kind = kind.ok_or_else(|| Error::InvalidMessage("tc message without kind".into()))?;
        attribute.options = TcOptions::unmarshal(&kind, options, endian, errs)?;
        Ok(Self { msg, attribute })
    }

    /// Re-encode the envelope the way [`encode_into`] lays it out, for
    /// tests and callers that need raw bytes without a netlink header.
    #[cfg(test)]
    fn marshal_envelope(&self, endian: Endian) -> Result<Vec<u8>> {
        use crate::netlink::attr::AttrWriter;

        let mut body = self.msg.marshal(endian);
        let mut attrs = AttrWriter::new(endian);
        attrs.string(tca::KIND, self.attribute.options.kind());
        if let Some(options) = self.attribute.options.marshal(endian)? {
            attrs.bytes(tca::OPTIONS, &options);
        }
        if let Some(chain) = self.attribute.chain {
            attrs.u32(tca::CHAIN, chain);
        }
        if let Some(block) = self.attribute.ingress_block {
            attrs.u32(tca::INGRESS_BLOCK, block);
        }
        if let Some(block) = self.attribute.egress_block {
            attrs.u32(tca::EGRESS_BLOCK, block);
        }
        body.extend_from_slice(&attrs.into_bytes());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::AttrWriter;
    use crate::tc::handle;
    use crate::tc::qdisc::netem::NetemQopt;

    fn round_trip(object: &TcObject) -> TcObject {
        let bytes = object.marshal_envelope(Endian::native()).unwrap();
        let mut errs = ErrorList::new();
        let decoded = TcObject::unmarshal(&bytes, Endian::native(), &mut errs).unwrap();
        assert!(errs.is_empty(), "unexpected decode errors: {:?}", errs);
        decoded
    }

    fn netem_object() -> TcObject {
        let msg = TcMsg::new()
            .with_ifindex(2)
            .with_handle(handle::build_handle(1, 0))
            .with_parent(handle::HANDLE_ROOT);
        TcObject::new(
            msg,
            TcOptions::Netem(Netem {
                qopt: NetemQopt {
                    latency: 42,
                    limit: 1000,
                    jitter: 7,
                    ..Default::default()
                },
                rate64: Some(1_000_000),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_netem_envelope_round_trip() {
        let object = netem_object();
        let decoded = round_trip(&object);
        assert_eq!(decoded, object);
        assert_eq!(decoded.attribute.options.kind(), "netem");
    }

    #[test]
    fn test_kind_only_round_trip() {
        let object = TcObject::new(
            TcMsg::new()
                .with_ifindex(3)
                .with_parent(handle::HANDLE_CLSACT),
            TcOptions::KindOnly {
                kind: "clsact".to_string(),
            },
        );
        assert_eq!(round_trip(&object), object);
    }

    #[test]
    fn test_raw_kind_round_trip() {
        let mut opts = AttrWriter::new(Endian::native());
        opts.u32(1, 5000);
        let object = TcObject::new(
            TcMsg::new().with_ifindex(1),
            TcOptions::Raw {
                kind: "tbf".to_string(),
                options: opts.into_bytes(),
            },
        );
        assert_eq!(round_trip(&object), object);
    }

    #[test]
    fn test_blocks_and_chain_round_trip() {
        let mut object = netem_object();
        object.attribute.chain = Some(7);
        object.attribute.ingress_block = Some(22);
        object.attribute.egress_block = Some(23);
        assert_eq!(round_trip(&object), object);
    }

    #[test]
    fn test_stats2_decoded() {
        let endian = Endian::native();
        let mut basic = crate::netlink::record::RecordWriter::with_capacity(endian, 16);
        basic.u64(123_456);
        basic.u32(789);
        basic.pad(4);
        let mut queue = crate::netlink::record::RecordWriter::with_capacity(endian, 20);
        queue.u32(3);
        queue.u32(4500);
        queue.u32(1);
        queue.u32(0);
        queue.u32(2);

        let mut nested = AttrWriter::new(endian);
        nested.bytes(tca_stats2::BASIC, &basic.finish());
        nested.bytes(tca_stats2::QUEUE, &queue.finish());
        nested.bytes(30, &[0u8; 4]); // future stats code, skipped

        let mut envelope = AttrWriter::new(endian);
        envelope.string(tca::KIND, "fq_codel");
        envelope.bytes(tca::STATS2, &nested.into_bytes());

        let mut body = TcMsg::new().with_ifindex(1).marshal(endian);
        body.extend_from_slice(&envelope.into_bytes());

        let mut errs = ErrorList::new();
        let object = TcObject::unmarshal(&body, endian, &mut errs).unwrap();
        assert!(errs.is_empty());
        let stats2 = object.attribute.stats2.unwrap();
        assert_eq!(
            stats2.basic,
            Some(StatsBasic {
                bytes: 123_456,
                packets: 789,
            })
        );
        assert_eq!(stats2.queue.unwrap().backlog, 4500);
        assert_eq!(stats2.rate_est, None);
        assert!(matches!(
            object.attribute.options,
            TcOptions::KindOnly { ref kind } if kind == "fq_codel"
        ));
    }

    #[test]
    fn test_missing_kind_rejected() {
        let endian = Endian::native();
        let mut envelope = AttrWriter::new(endian);
        envelope.u32(tca::CHAIN, 1);
        let mut body = TcMsg::new().marshal(endian);
        body.extend_from_slice(&envelope.into_bytes());

        let mut errs = ErrorList::new();
        assert!(matches!(
            TcObject::unmarshal(&body, endian, &mut errs),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_short_header_rejected() {
        let mut errs = ErrorList::new();
        assert!(matches!(
            TcObject::unmarshal(&[0u8; 19], Endian::native(), &mut errs),
            Err(Error::InsufficientBytes {
                what: "tc header",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_envelope_attribute_rejected() {
        let endian = Endian::native();
        let mut envelope = AttrWriter::new(endian);
        envelope.string(tca::KIND, "netem");
        envelope.u32(50, 1);
        let mut body = TcMsg::new().marshal(endian);
        body.extend_from_slice(&envelope.into_bytes());

        let mut errs = ErrorList::new();
        assert!(matches!(
            TcObject::unmarshal(&body, endian, &mut errs),
            Err(Error::UnknownAttribute {
                schema: "tc",
                attr_type: 50,
            })
        ));
    }

    #[test]
    fn test_empty_kind_encode_rejected() {
        let object = TcObject::new(
            TcMsg::new(),
            TcOptions::KindOnly {
                kind: String::new(),
            },
        );
        let mut builder =
            MessageBuilder::new(crate::netlink::message::NlMsgType::RTM_NEWQDISC, 0);
        assert!(matches!(
            object.encode_into(&mut builder, Endian::native()),
            Err(Error::InvalidMessage(_))
        ));
    }
}
