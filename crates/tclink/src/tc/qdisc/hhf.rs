//! Heavy-hitter filter (hhf) qdisc options.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::Endian;

mod tca_hhf {
    pub const BACKLOG_LIMIT: u16 = 1;
    pub const QUANTUM: u16 = 2;
    pub const HH_FLOWS_LIMIT: u16 = 3;
    pub const RESET_TIMEOUT: u16 = 4;
    pub const ADMIT_BYTES: u16 = 5;
    pub const EVICT_TIMEOUT: u16 = 6;
    pub const NON_HH_WEIGHT: u16 = 7;
}

/// Hhf discipline payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hhf {
    pub backlog_limit: Option<u32>,
    pub quantum: Option<u32>,
    /// Maximum number of tracked heavy-hitter flows.
    pub hh_flows_limit: Option<u32>,
    pub reset_timeout: Option<u32>,
    /// Bytes a flow may send before being classified heavy.
    pub admit_bytes: Option<u32>,
    pub evict_timeout: Option<u32>,
    /// WDRR weight of the non-heavy bucket.
    pub non_hh_weight: Option<u32>,
}

impl Hhf {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        let fields = [
            (tca_hhf::BACKLOG_LIMIT, self.backlog_limit),
            (tca_hhf::QUANTUM, self.quantum),
            (tca_hhf::HH_FLOWS_LIMIT, self.hh_flows_limit),
            (tca_hhf::RESET_TIMEOUT, self.reset_timeout),
            (tca_hhf::ADMIT_BYTES, self.admit_bytes),
            (tca_hhf::EVICT_TIMEOUT, self.evict_timeout),
            (tca_hhf::NON_HH_WEIGHT, self.non_hh_weight),
        ];
        for (attr_type, value) in fields {
            if let Some(value) = value {
                attrs.u32(attr_type, value);
            }
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = Hhf::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            let field = match attr_type {
                tca_hhf::BACKLOG_LIMIT => &mut opts.backlog_limit,
                tca_hhf::QUANTUM => &mut opts.quantum,
                tca_hhf::HH_FLOWS_LIMIT => &mut opts.hh_flows_limit,
                tca_hhf::RESET_TIMEOUT => &mut opts.reset_timeout,
                tca_hhf::ADMIT_BYTES => &mut opts.admit_bytes,
                tca_hhf::EVICT_TIMEOUT => &mut opts.evict_timeout,
                tca_hhf::NON_HH_WEIGHT => &mut opts.non_hh_weight,
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "hhf",
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

    #[test]
    fn test_round_trip() {
        let variants = [
            Hhf::default(),
            Hhf {
                backlog_limit: Some(1000),
                quantum: Some(1514),
                hh_flows_limit: Some(2048),
                reset_timeout: Some(40),
                admit_bytes: Some(128 << 10),
                evict_timeout: Some(1000),
                non_hh_weight: Some(2),
            },
            Hhf {
                non_hh_weight: Some(0),
                ..Default::default()
            },
        ];
        for opts in variants {
            let mut errs = ErrorList::new();
            let decoded =
                Hhf::unmarshal(&opts.marshal(Endian::native()), Endian::native(), &mut errs)
                    .unwrap();
            assert!(errs.is_empty());
            assert_eq!(decoded, opts);
        }
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.u32(8, 1);
        let mut errs = ErrorList::new();
        assert!(matches!(
            Hhf::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs),
            Err(Error::UnknownAttribute {
                schema: "hhf",
                attr_type: 8,
            })
        ));
    }
}
