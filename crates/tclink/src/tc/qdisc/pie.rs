//! Proportional integral controller enhanced (pie) qdisc options.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::Endian;

mod tca_pie {
    pub const TARGET: u16 = 1;
    pub const LIMIT: u16 = 2;
    pub const TUPDATE: u16 = 3;
    pub const ALPHA: u16 = 4;
    pub const BETA: u16 = 5;
    pub const ECN: u16 = 6;
    pub const BYTEMODE: u16 = 7;
}

/// Pie discipline payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pie {
    /// Target queue delay in microseconds.
    pub target: Option<u32>,
    /// Queue limit in packets.
    pub limit: Option<u32>,
    /// Drop-probability update interval in microseconds.
    pub tupdate: Option<u32>,
    pub alpha: Option<u32>,
    pub beta: Option<u32>,
    /// Mark instead of drop (0 or 1).
    pub ecn: Option<u32>,
    /// Scale drop probability by packet size (0 or 1).
    pub bytemode: Option<u32>,
}

impl Pie {
    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        let fields = [
            (tca_pie::TARGET, self.target),
            (tca_pie::LIMIT, self.limit),
            (tca_pie::TUPDATE, self.tupdate),
            (tca_pie::ALPHA, self.alpha),
            (tca_pie::BETA, self.beta),
            (tca_pie::ECN, self.ecn),
            (tca_pie::BYTEMODE, self.bytemode),
        ];
        for (attr_type, value) in fields {
            if let Some(value) = value {
                attrs.u32(attr_type, value);
            }
        }
        attrs.into_bytes()
    }

    pub fn unmarshal(data: &[u8], endian: Endian, errs: &mut ErrorList) -> Result<Self> {
        let mut opts = Pie::default();
        for (attr_type, payload) in AttrIter::new(data, endian) {
            let field = match attr_type {
                tca_pie::TARGET => &mut opts.target,
                tca_pie::LIMIT => &mut opts.limit,
                tca_pie::TUPDATE => &mut opts.tupdate,
                tca_pie::ALPHA => &mut opts.alpha,
                tca_pie::BETA => &mut opts.beta,
                tca_pie::ECN => &mut opts.ecn,
                tca_pie::BYTEMODE => &mut opts.bytemode,
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "pie",
                        attr_type,
                    });
                }
            };
            *field = errs.record(get::u32(payload, endian));
        }
        Ok(opts)
    }
}
