//! Controlled delay (codel) qdisc options.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::Endian;

mod tca_codel {
    pub const TARGET: u16 = 1;
    pub const LIMIT: u16 = 2;
    pub const INTERVAL: u16 = 3;
    pub const ECN: u16 = 4;
    pub const CE_THRESHOLD: u16 = 5;
}

/// Codel discipline payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codel {
    /// Acceptable queue delay in microseconds.
    pub target: Option<u32>,
    /// Hard queue limit in packets.
    pub limit: Option<u32>,
    /// Delay measurement window in microseconds.
    pub interval: Option<u32>,
    /// Mark instead of drop (0 or 1).
    pub ecn: Option<u32>,
    pub ce_threshold: Option<u32>,
}

impl Codel {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        let fields = [
            (tca_codel::TARGET, self.target),
            (tca_codel::LIMIT, self.limit),
            (tca_codel::INTERVAL, self.interval),
            (tca_codel::ECN, self.ecn),
            (tca_codel::CE_THRESHOLD, self.ce_threshold),
        ];
        for (attr_type, value) in fields {
            if let Some(value) = value {
                attrs.u32(attr_type, value);
            }
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = Codel::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            let field = match attr_type {
                tca_codel::TARGET => &mut opts.target,
                tca_codel::LIMIT => &mut opts.limit,
                tca_codel::INTERVAL => &mut opts.interval,
                tca_codel::ECN => &mut opts.ecn,
                tca_codel::CE_THRESHOLD => &mut opts.ce_threshold,
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "codel",
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
            Codel::default(),
            Codel {
                target: Some(5000),
                limit: Some(1000),
                interval: Some(100_000),
                ecn: Some(0),
                ce_threshold: Some(1500),
            },
            Codel {
                interval: Some(0),
                ..Default::default()
            },
        ];
        for opts in variants {
            let mut errs = ErrorList::new();
            let decoded =
                Codel::unmarshal(&opts.marshal(Endian::native()), Endian::native(), &mut errs)
                    .unwrap();
            assert!(errs.is_empty());
            assert_eq!(decoded, opts);
        }
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut attrs = AttrWriter::new(Endian::native());
        attrs.u32(6, 1);
        let mut errs = ErrorList::new();
        assert!(matches!(
            Codel::unmarshal(&attrs.into_bytes(), Endian::native(), &mut errs),
            Err(Error::UnknownAttribute {
                schema: "codel",
                attr_type: 6,
            })
        ));
    }
}
