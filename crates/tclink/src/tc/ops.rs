//! Add/replace/change/delete/get operations for qdiscs, classes and
//! filters.

use tracing::debug;

use crate::netlink::builder::MessageBuilder;
use crate::netlink::connection::{
    Connection, ack_request, create_request, dump_request, replace_request,
};
use crate::netlink::error::{ErrorList, Result};
use crate::netlink::message::{NLMSG_HDRLEN, NlMsgType};
use crate::netlink::record::Endian;
use crate::tc::msg::TcMsg;
use crate::tc::object::TcObject;

/// Result of a dump: every object that decoded, plus the per-message
/// decode errors that did not stop the dump.
#[derive(Debug, Default)]
pub struct TcDump {
    pub objects: Vec<TcObject>,
    pub errors: ErrorList,
}

impl TcDump {
    /// The decoded objects, or the aggregated error if any message in
    /// the dump failed to decode cleanly.
    pub fn into_result(self) -> Result<Vec<TcObject>> {
        self.errors.into_result()?;
        Ok(self.objects)
    }
}

/// Shared plumbing behind the qdisc, class and filter facades.
struct Tc<'a> {
    conn: &'a Connection,
    kind: &'static str,
    new: u16,
    del: u16,
    get: u16,
}

impl Tc<'_> {
    async fn modify(&self, mut builder: MessageBuilder, object: &TcObject) -> Result<()> {
        object.encode_into(&mut builder, Endian::native())?;
        debug!(
            object = self.kind,
            ifindex = object.msg.ifindex,
            handle = object.msg.handle,
            kind = object.attribute.options.kind(),
            "modifying"
        );
        self.conn.request_ack(builder).await
    }

    async fn add(&self, object: &TcObject) -> Result<()> {
        self.modify(create_request(self.new), object).await
    }

    async fn replace(&self, object: &TcObject) -> Result<()> {
        self.modify(replace_request(self.new), object).await
    }

    async fn change(&self, object: &TcObject) -> Result<()> {
        self.modify(ack_request(self.new), object).await
    }

    async fn delete(&self, object: &TcObject) -> Result<()> {
        self.modify(ack_request(self.del), object).await
    }

    async fn dump(&self, msg: &TcMsg) -> Result<TcDump> {
        let mut builder = dump_request(self.get);
        builder.append_bytes(&msg.marshal(Endian::native()));
        let responses = self.conn.dump(builder).await?;

        let dump = decode_dump(&responses, Endian::native());
        debug!(
            object = self.kind,
            objects = dump.objects.len(),
            errors = dump.errors.len(),
            "dump decoded"
        );
        Ok(dump)
    }
}

/// Decode every dump response message, keeping well-formed siblings
/// when one message is malformed.
fn decode_dump(responses: &[Vec<u8>], endian: Endian) -> TcDump {
    let mut dump = TcDump::default();
    for response in responses {
        match TcObject::unmarshal(&response[NLMSG_HDRLEN..], endian, &mut dump.errors) {
            Ok(object) => dump.objects.push(object),
            Err(e) => dump.errors.push(e),
        }
    }
    dump
}

/// Queueing discipline operations.
pub struct Qdisc<'a> {
    tc: Tc<'a>,
}

impl<'a> Qdisc<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            tc: Tc {
                conn,
                kind: "qdisc",
                new: NlMsgType::RTM_NEWQDISC,
                del: NlMsgType::RTM_DELQDISC,
                get: NlMsgType::RTM_GETQDISC,
            },
        }
    }

    /// Install a new qdisc; fails if one already exists at the handle.
    pub async fn add(&self, object: &TcObject) -> Result<()> {
        self.tc.add(object).await
    }

    /// Install a qdisc, replacing any existing one at the handle.
    pub async fn replace(&self, object: &TcObject) -> Result<()> {
        self.tc.replace(object).await
    }

    /// Change the parameters of an existing qdisc in place.
    pub async fn change(&self, object: &TcObject) -> Result<()> {
        self.tc.change(object).await
    }

    pub async fn delete(&self, object: &TcObject) -> Result<()> {
        self.tc.delete(object).await
    }

    /// Dump all qdiscs on all interfaces.
    pub async fn get(&self) -> Result<TcDump> {
        self.tc.dump(&TcMsg::new()).await
    }
}

/// Traffic class operations.
pub struct Class<'a> {
    tc: Tc<'a>,
}

impl<'a> Class<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            tc: Tc {
                conn,
                kind: "class",
                new: NlMsgType::RTM_NEWTCLASS,
                del: NlMsgType::RTM_DELTCLASS,
                get: NlMsgType::RTM_GETTCLASS,
            },
        }
    }

    pub async fn add(&self, object: &TcObject) -> Result<()> {
        self.tc.add(object).await
    }

    pub async fn replace(&self, object: &TcObject) -> Result<()> {
        self.tc.replace(object).await
    }

    pub async fn change(&self, object: &TcObject) -> Result<()> {
        self.tc.change(object).await
    }

    pub async fn delete(&self, object: &TcObject) -> Result<()> {
        self.tc.delete(object).await
    }

    /// Dump the classes matching `msg` (interface, parent).
    pub async fn get(&self, msg: &TcMsg) -> Result<TcDump> {
        self.tc.dump(msg).await
    }
}

/// Filter operations.
pub struct Filter<'a> {
    tc: Tc<'a>,
}

impl<'a> Filter<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            tc: Tc {
                conn,
                kind: "filter",
                new: NlMsgType::RTM_NEWTFILTER,
                del: NlMsgType::RTM_DELTFILTER,
                get: NlMsgType::RTM_GETTFILTER,
            },
        }
    }

    pub async fn add(&self, object: &TcObject) -> Result<()> {
        self.tc.add(object).await
    }

    pub async fn replace(&self, object: &TcObject) -> Result<()> {
        self.tc.replace(object).await
    }

    pub async fn change(&self, object: &TcObject) -> Result<()> {
        self.tc.change(object).await
    }

    pub async fn delete(&self, object: &TcObject) -> Result<()> {
        self.tc.delete(object).await
    }

    /// Dump the filters matching `msg` (interface, parent, priority).
    pub async fn get(&self, msg: &TcMsg) -> Result<TcDump> {
        self.tc.dump(msg).await
    }
}
