//! Netlink message framing.
//!
//! A receive buffer holds one or more length-prefixed messages, each a
//! 16-byte nlmsghdr followed by a payload, padded to 4 bytes between
//! messages. [`MessageIter`] walks such a buffer; [`NlMsgError`]
//! decodes the ACK/error payload the kernel answers requests with.

use super::attr::{AttrIter, get};
use super::error::{Error, Result};
use super::record::Endian;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Round a message length up to the 4-byte netlink boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + 3) & !3
}

/// Byte length of struct nlmsghdr.
pub const NLMSG_HDRLEN: usize = nlmsg_align(size_of::<NlMsgHdr>());

/// The fixed header in front of every netlink message
/// (struct nlmsghdr).
///
/// Always in host byte order: rtnetlink talks to the local kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Total message length, header included.
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    /// Sequence number echoed back in every reply.
    pub nlmsg_seq: u32,
    /// Port id of the sender (0 for the kernel).
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// A header for an outgoing message; length covers the header only
    /// until a payload is appended.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    pub fn payload_len(&self) -> usize {
        self.nlmsg_len as usize - NLMSG_HDRLEN
    }

    /// NLMSG_ERROR, which doubles as the ACK carrier.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// NLMSG_DONE, the terminator of a multipart dump.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Part of a multipart response.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(header, _)| header)
            .map_err(|_| Error::Truncated {
                expected: size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Message type codes this crate sends and receives: the two netlink
/// control types plus the rtnetlink traffic-control triples.
pub struct NlMsgType;

impl NlMsgType {
    /// Error report, or ACK when the carried errno is 0.
    pub const ERROR: u16 = 2;
    /// Last message of a multipart dump.
    pub const DONE: u16 = 3;

    pub const RTM_NEWQDISC: u16 = 36;
    pub const RTM_DELQDISC: u16 = 37;
    pub const RTM_GETQDISC: u16 = 38;

    pub const RTM_NEWTCLASS: u16 = 40;
    pub const RTM_DELTCLASS: u16 = 41;
    pub const RTM_GETTCLASS: u16 = 42;

    pub const RTM_NEWTFILTER: u16 = 44;
    pub const RTM_DELTFILTER: u16 = 45;
    pub const RTM_GETTFILTER: u16 = 46;
}

// nlmsg_flags. REPLACE/EXCL/CREATE overlay ROOT/MATCH/ATOMIC; which
// set applies depends on whether the request is a NEW or a GET.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;

pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

/// Walks the netlink messages packed into one receive buffer.
///
/// Yields the header and payload of each message. A header that lies
/// about its length (shorter than a header, or past the end of the
/// buffer) yields an error and iteration stops there.
pub struct MessageIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> MessageIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(&'a NlMsgHdr, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.data[self.offset.min(self.data.len())..];
        if remaining.len() < NLMSG_HDRLEN {
            return None;
        }

        let header = match NlMsgHdr::from_bytes(remaining) {
            Ok(header) => header,
            Err(e) => return Some(Err(e)),
        };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > remaining.len() {
            return Some(Err(Error::InvalidMessage(format!(
                "message length {msg_len} outside buffer"
            ))));
        }

        let payload = &remaining[NLMSG_HDRLEN..msg_len];
        self.offset += nlmsg_align(msg_len);
        Some(Ok((header, payload)))
    }
}

/// Payload of an NLMSG_ERROR message: the errno and the header of the
/// request it answers. With extended ACKs enabled the kernel may
/// append attributes after this record.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Negative errno, or 0 for a plain ACK.
    pub error: i32,
    pub msg: NlMsgHdr,
}

/// Extended-ACK attribute carrying a human-readable kernel message.
const NLMSGERR_ATTR_MSG: u16 = 1;

impl NlMsgError {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(err, _)| err)
            .map_err(|_| Error::Truncated {
                expected: size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// True when the kernel reported success.
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }

    /// The extended-ACK message text, if the kernel attached one to
    /// this error payload.
    pub fn ext_ack_msg<'a>(&self, payload: &'a [u8]) -> Option<&'a str> {
        let attrs = payload.get(size_of::<Self>()..)?;
        AttrIter::new(attrs, Endian::native())
            .find(|(attr_type, _)| *attr_type == NLMSGERR_ATTR_MSG)
            .and_then(|(_, text)| get::string(text).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(msg_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut header = NlMsgHdr::new(msg_type, NLM_F_MULTI);
        header.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
        let mut buf = header.as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(nlmsg_align(buf.len()), 0);
        buf
    }

    #[test]
    fn test_iterates_packed_messages() {
        let mut data = message(NlMsgType::RTM_NEWQDISC, &[1, 2, 3, 4, 5]);
        data.extend_from_slice(&message(NlMsgType::DONE, &[]));

        let mut iter = MessageIter::new(&data);
        let (header, payload) = iter.next().unwrap().unwrap();
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_NEWQDISC);
        assert_eq!(header.payload_len(), 5);
        assert!(header.is_multi());
        assert_eq!(payload, &[1, 2, 3, 4, 5]);

        let (header, payload) = iter.next().unwrap().unwrap();
        assert!(header.is_done());
        assert!(payload.is_empty());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_length_past_buffer_is_rejected() {
        let mut data = message(NlMsgType::RTM_NEWQDISC, &[0; 4]);
        data[0] = 200; // claims more bytes than the buffer holds

        let mut iter = MessageIter::new(&data);
        assert!(matches!(
            iter.next(),
            Some(Err(Error::InvalidMessage(_)))
        ));
    }

    #[test]
    fn test_trailing_partial_header_ignored() {
        let mut data = message(NlMsgType::DONE, &[]);
        data.extend_from_slice(&[0u8; 7]);

        let mut iter = MessageIter::new(&data);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_ext_ack_msg() {
        let mut payload = (-22i32).to_ne_bytes().to_vec();
        payload.extend_from_slice(NlMsgHdr::new(NlMsgType::RTM_NEWQDISC, 0).as_bytes());
        let mut attrs = crate::netlink::attr::AttrWriter::new(Endian::native());
        attrs.string(NLMSGERR_ATTR_MSG, "invalid handle");
        payload.extend_from_slice(&attrs.into_bytes());

        let err = NlMsgError::from_bytes(&payload).unwrap();
        assert!(!err.is_ack());
        assert_eq!(err.ext_ack_msg(&payload), Some("invalid handle"));

        let bare = &payload[..size_of::<NlMsgError>()];
        assert_eq!(NlMsgError::from_bytes(bare).unwrap().ext_ack_msg(bare), None);
    }
}
