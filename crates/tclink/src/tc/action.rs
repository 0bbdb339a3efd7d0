//! Traffic-control actions attached to filters.
//!
//! On the wire an action list is a TLV stream whose type codes are
//! 1-based list positions; each entry nests a kind string, an optional
//! instance index, and a kind-specific options stream. Generic-action
//! and mirred parameters are decoded into typed records, anything else
//! is carried verbatim.

use crate::netlink::attr::{AttrIter, AttrWriter, get};
use crate::netlink::error::{Error, ErrorList, Result};
use crate::netlink::record::{Endian, RecordReader, RecordWriter};

mod tca_act {
    pub const KIND: u16 = 1;
    pub const OPTIONS: u16 = 2;
    pub const INDEX: u16 = 3;
    pub const STATS: u16 = 4;
    pub const PAD: u16 = 5;
    pub const COOKIE: u16 = 6;
}

mod tca_gact {
    pub const TM: u16 = 1;
    pub const PARMS: u16 = 2;
    pub const PROB: u16 = 3;
}

mod tca_mirred {
    pub const TM: u16 = 1;
    pub const PARMS: u16 = 2;
    pub const PAD: u16 = 3;
}

/// Generic action parameters (mirrors struct tc_gact).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcGact {
    pub index: u32,
    pub capab: u32,
    /// Verdict (TC_ACT_SHOT, TC_ACT_OK, ...).
    pub action: i32,
    pub refcnt: i32,
    pub bindcnt: i32,
}

impl TcGact {
    pub const SIZE: usize = 20;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.index);
        w.u32(self.capab);
        w.i32(self.action);
        w.i32(self.refcnt);
        w.i32(self.bindcnt);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "gact parms", endian)?;
        Ok(Self {
            index: r.u32(),
            capab: r.u32(),
            action: r.i32(),
            refcnt: r.i32(),
            bindcnt: r.i32(),
        })
    }
}

/// Mirror/redirect action parameters (mirrors struct tc_mirred).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcMirred {
    pub index: u32,
    pub capab: u32,
    pub action: i32,
    pub refcnt: i32,
    pub bindcnt: i32,
    /// TCA_EGRESS_REDIR, TCA_EGRESS_MIRROR, ...
    pub eaction: i32,
    /// Target interface index.
    pub ifindex: u32,
}

impl TcMirred {
    pub const SIZE: usize = 28;

    pub fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut w = RecordWriter::with_capacity(endian, Self::SIZE);
        w.u32(self.index);
        w.u32(self.capab);
        w.i32(self.action);
        w.i32(self.refcnt);
        w.i32(self.bindcnt);
        w.i32(self.eaction);
        w.u32(self.ifindex);
        w.finish()
    }

    pub fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut r = RecordReader::exact(data, Self::SIZE, "mirred parms", endian)?;
        Ok(Self {
            index: r.u32(),
            capab: r.u32(),
            action: r.i32(),
            refcnt: r.i32(),
            bindcnt: r.i32(),
            eaction: r.i32(),
            ifindex: r.u32(),
        })
    }
}

/// Kind-specific payload of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Gact(TcGact),
    Mirred(TcMirred),
    /// Any other kind, with its options stream carried verbatim.
    Other { kind: String, options: Vec<u8> },
}

impl ActionKind {
    /// The action kind string sent on the wire.
    pub fn name(&self) -> &str {
        match self {
            ActionKind::Gact(_) => "gact",
            ActionKind::Mirred(_) => "mirred",
            ActionKind::Other { kind, .. } => kind,
        }
    }

    fn options(&self, endian: Endian) -> Vec<u8> {
        match self {
            ActionKind::Gact(parms) => {
                let mut nested = AttrWriter::new(endian);
                nested.bytes(tca_gact::PARMS, &parms.marshal(endian));
                nested.into_bytes()
            }
            ActionKind::Mirred(parms) => {
                let mut nested = AttrWriter::new(endian);
                nested.bytes(tca_mirred::PARMS, &parms.marshal(endian));
                nested.into_bytes()
            }
            ActionKind::Other { options, .. } => options.clone(),
        }
    }
}

/// One action in a filter's action list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Kernel-assigned action instance index; `None` on a request lets
    /// the kernel pick one.
    pub index: Option<u32>,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { index: None, kind }
    }

    /// The action kind string sent on the wire.
    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }

    fn marshal(&self, endian: Endian) -> Vec<u8> {
        let mut attrs = AttrWriter::new(endian);
        attrs.string(tca_act::KIND, self.kind.name());
        if let Some(index) = self.index {
            attrs.u32(tca_act::INDEX, index);
        }
        let options = self.kind.options(endian);
        if !options.is_empty() {
            attrs.bytes(tca_act::OPTIONS, &options);
        }
        attrs.into_bytes()
    }

    fn unmarshal(data: &[u8], endian: Endian) -> Result<Self> {
        let mut kind = None;
        let mut index = None;
        let mut options: &[u8] = &[];
        for (attr_type, payload) in AttrIter::new(data, endian) {
            match attr_type {
                tca_act::KIND => kind = Some(get::string(payload)?.to_string()),
                tca_act::INDEX => index = Some(get::u32(payload, endian)?),
                tca_act::OPTIONS => options = payload,
                tca_act::STATS | tca_act::COOKIE | tca_act::PAD => {}
                _ => {
                    return Err(Error::UnknownAttribute {
                        schema: "action",
                        attr_type,
                    });
                }
            }
        }
        let kind = kind.ok_or_else(|| Error::InvalidAttribute("action without kind".into()))?;

        let kind = match kind.as_str() {
            "gact" => ActionKind::Gact(unmarshal_gact(options, endian)?),
            "mirred" => ActionKind::Mirred(unmarshal_mirred(options, endian)?),
            _ => ActionKind::Other {
                kind,
                options: options.to_vec(),
            },
        };
        Ok(Self { index, kind })
    }
}

fn unmarshal_gact(data: &[u8], endian: Endian) -> Result<TcGact> {
    let mut parms = None;
    for (attr_type, payload) in AttrIter::new(data, endian) {
        match attr_type {
            tca_gact::PARMS => parms = Some(TcGact::unmarshal(payload, endian)?),
            tca_gact::TM | tca_gact::PROB => {}
            _ => {
                return Err(Error::UnknownAttribute {
                    schema: "gact",
                    attr_type,
                });
            }
        }
    }
    parms.ok_or_else(|| Error::InvalidAttribute("gact without parameters".into()))
}

fn unmarshal_mirred(data: &[u8], endian: Endian) -> Result<TcMirred> {
    let mut parms = None;
    for (attr_type, payload) in AttrIter::new(data, endian) {
        match attr_type {
            tca_mirred::PARMS => parms = Some(TcMirred::unmarshal(payload, endian)?),
            tca_mirred::TM | tca_mirred::PAD => {}
            _ => {
                return Err(Error::UnknownAttribute {
                    schema: "mirred",
                    attr_type,
                });
            }
        }
    }
    parms.ok_or_else(|| Error::InvalidAttribute("mirred without parameters".into()))
}

/// Encode an ordered action list; list position becomes the type code.
pub(crate) fn marshal_actions(actions: &[Action], endian: Endian) -> Vec<u8> {
    let mut attrs = AttrWriter::new(endian);
    for (i, action) in actions.iter().enumerate() {
        attrs.bytes((i + 1) as u16, &action.marshal(endian));
    }
    attrs.into_bytes()
}

/// Decode an action list, preserving wire order.
pub(crate) fn unmarshal_actions(
    data: &[u8],
    endian: Endian,
    errs: &mut ErrorList,
) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for (_, payload) in AttrIter::new(data, endian) {
        if let Some(action) = errs.record(Action::unmarshal(payload, endian)) {
            actions.push(action);
        }
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_list_round_trip() {
        let actions = vec![
            Action::new(ActionKind::Gact(TcGact {
                action: 2, // TC_ACT_SHOT
                ..Default::default()
            })),
            Action {
                index: Some(7),
                kind: ActionKind::Mirred(TcMirred {
                    eaction: 1, // TCA_EGRESS_REDIR
                    ifindex: 4,
                    ..Default::default()
                }),
            },
            Action::new(ActionKind::Other {
                kind: "pedit".to_string(),
                options: vec![],
            }),
        ];

        let bytes = marshal_actions(&actions, Endian::native());
        let mut errs = ErrorList::new();
        let decoded = unmarshal_actions(&bytes, Endian::native(), &mut errs).unwrap();
        assert!(errs.is_empty());
        assert_eq!(decoded, actions);
    }

    #[test]
    fn test_entry_index_survives_reencode() {
        // A dumped gact entry carries its instance index; re-encoding
        // the decoded entry must keep it.
        let mut nested = AttrWriter::new(Endian::native());
        nested.bytes(tca_gact::PARMS, &TcGact::default().marshal(Endian::native()));
        let mut entry = AttrWriter::new(Endian::native());
        entry.string(tca_act::KIND, "gact");
        entry.u32(tca_act::INDEX, 42);
        entry.bytes(tca_act::OPTIONS, &nested.into_bytes());
        let mut list = AttrWriter::new(Endian::native());
        list.bytes(1, &entry.into_bytes());

        let mut errs = ErrorList::new();
        let decoded = unmarshal_actions(&list.into_bytes(), Endian::native(), &mut errs).unwrap();
        assert!(errs.is_empty());
        assert_eq!(decoded[0].index, Some(42));

        let reencoded = marshal_actions(&decoded, Endian::native());
        let (_, entry) = AttrIter::new(&reencoded, Endian::native()).next().unwrap();
        let index = AttrIter::new(entry, Endian::native())
            .find(|(attr_type, _)| *attr_type == tca_act::INDEX)
            .map(|(_, payload)| get::u32(payload, Endian::native()).unwrap());
        assert_eq!(index, Some(42));
    }

    #[test]
    fn test_order_preserved() {
        let actions = vec![
            Action::new(ActionKind::Gact(TcGact {
                index: 1,
                ..Default::default()
            })),
            Action::new(ActionKind::Gact(TcGact {
                index: 2,
                ..Default::default()
            })),
        ];
        let bytes = marshal_actions(&actions, Endian::native());
        let mut errs = ErrorList::new();
        let decoded = unmarshal_actions(&bytes, Endian::native(), &mut errs).unwrap();
        assert_eq!(decoded, actions);
    }

    #[test]
    fn test_action_without_kind_aggregates() {
        let mut entry = AttrWriter::new(Endian::native());
        entry.u32(tca_act::INDEX, 5);
        let mut list = AttrWriter::new(Endian::native());
        list.bytes(1, &entry.into_bytes());

        let mut errs = ErrorList::new();
        let decoded = unmarshal_actions(&list.into_bytes(), Endian::native(), &mut errs).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_malformed_gact_parms() {
        let mut nested = AttrWriter::new(Endian::native());
        nested.bytes(tca_gact::PARMS, &[0u8; 10]);
        let mut entry = AttrWriter::new(Endian::native());
        entry.string(tca_act::KIND, "gact");
        entry.bytes(tca_act::OPTIONS, &nested.into_bytes());
        let mut list = AttrWriter::new(Endian::native());
        list.bytes(1, &entry.into_bytes());

        let mut errs = ErrorList::new();
        let decoded = unmarshal_actions(&list.into_bytes(), Endian::native(), &mut errs).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(errs.len(), 1);
        assert!(errs.into_result().unwrap_err().to_string().contains("gact parms"));
    }
}
