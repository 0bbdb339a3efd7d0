//! Fair-queueing controlled delay (fq_codel) qdisc options.
//!
//! Pure TLV schema of independent 32-bit knobs; no fixed prefix.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::Endian;

mod tca_fq_codel {
    pub const TARGET: u16 = 1;
    pub const LIMIT: u16 = 2;
    pub const INTERVAL: u16 = 3;
    pub const ECN: u16 = 4;
    pub const FLOWS: u16 = 5;
    pub const QUANTUM: u16 = 6;
    pub const CE_THRESHOLD: u16 = 7;
    pub const DROP_BATCH_SIZE: u16 = 8;
    pub const MEMORY_LIMIT: u16 = 9;
}

/// FqCodel discipline payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FqCodel {
    /// Acceptable queue delay in microseconds.
    pub target: Option<u32>,
    /// Hard queue limit in packets.
    pub limit: Option<u32>,
    /// Delay measurement window in microseconds.
    pub interval: Option<u32>,
    /// Mark instead of drop (0 or 1).
    pub ecn: Option<u32>,
    /// Number of flow queues.
    pub flows: Option<u32>,
    /// Bytes dequeued per flow per round.
    pub quantum: Option<u32>,
    pub ce_threshold: Option<u32>,
    pub drop_batch_size: Option<u32>,
    pub memory_limit: Option<u32>,
}

impl FqCodel {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        let fields = [
            (tca_fq_codel::TARGET, self.target),
            (tca_fq_codel::LIMIT, self.limit),
            (tca_fq_codel::INTERVAL, self.interval),
            (tca_fq_codel::ECN, self.ecn),
            (tca_fq_codel::FLOWS, self.flows),
            (tca_fq_codel::QUANTUM, self.quantum),
            (tca_fq_codel::CE_THRESHOLD, self.ce_threshold),
            (tca_fq_codel::DROP_BATCH_SIZE, self.drop_batch_size),
            (tca_fq_codel::MEMORY_LIMIT, self.memory_limit),
        ];
        for (attr_type, value) in fields {
            if let Some(value) = value {
                attrs.u32(attr_type, value);
            }
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = FqCodel::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            let field = match attr_type {
                tca_fq_codel::TARGET => &mut opts.target,
                tca_fq_codel::LIMIT => &mut opts.limit,
                tca_fq_codel::INTERVAL => &mut opts.interval,
                tca_fq_codel::ECN => &mut opts.ecn,
                tca_fq_codel::FLOWS => &mut opts.flows,
                tca_fq_codel::QUANTUM => &mut opts.quantum,
                tca_fq_codel::CE_THRESHOLD => &mut opts.ce_threshold,
                tca_fq_codel::DROP_BATCH_SIZE => &mut opts.drop_batch_size,
                tca_fq_codel::MEMORY_LIMIT => &mut opts.memory_limit,
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "fq_codel",
                        attr_type,
                    });
                }
            };
            *field = errs.record(get::u32(payload, endian));
        }
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(opts: &FqCodel) -> FqCodel {
        let mut errs = ErrorList::new();
        let decoded =
            FqCodel::unmarshal(&opts.marshal(Endian::native()), Endian::native(), &mut errs)
                .unwrap();
        assert!(errs.is_empty());
        decoded
    }

    #[test]
    fn test_round_trip_extremes() {
        assert_eq!(round_trip(&FqCodel::default()), FqCodel::default());

        let full = FqCodel {
            target: Some(5000),
            limit: Some(10240),
            interval: Some(100_000),
            ecn: Some(1),
            flows: Some(1024),
            quantum: Some(1514),
            ce_threshold: Some(4000),
            drop_batch_size: Some(64),
            memory_limit: Some(32 << 20),
        };
        assert_eq!(round_trip(&full), full);
    }

    #[test]
    fn test_zero_value_stays_present() {
        let opts = FqCodel {
            ecn: Some(0),
            ..Default::default()
        };
        let decoded = round_trip(&opts);
        assert_eq!(decoded.ecn, Some(0));
        assert_eq!(decoded.target, None);
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.u32(77, 1);
        let mut errs = ErrorList::new();
        let err = FqCodel::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownAttribute {
                schema: "fq_codel",
                attr_type: 77,
            }
        ));
    }
}
