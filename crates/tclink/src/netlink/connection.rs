//! High-level netlink connection with request/response handling.

use tracing::trace;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REPLACE, NLM_F_REQUEST,
    NlMsgError, NlMsgHdr,
};
use super::socket::NetlinkSocket;

/// High-level netlink route connection.
///
/// One connection carries one request/response exchange at a time;
/// concurrent traffic-control calls should use separate connections.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Open a connection to the kernel's routing netlink family.
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new()?,
        })
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    /// Send a request that expects an ACK only (no data response).
    pub async fn request_ack(&self, mut builder: MessageBuilder) -> Result<()> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        trace!(seq, len = msg.len(), "sending netlink request");
        self.socket.send(&msg).await?;

        // Receive ACK
        let response = self.socket.recv_msg().await?;
        self.process_ack(&response, seq)?;

        Ok(())
    }

    /// Send a dump request and collect all responses.
    pub async fn dump(&self, mut builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        trace!(seq, len = msg.len(), "sending netlink dump request");
        self.socket.send(&msg).await?;

        let mut responses = Vec::new();

        loop {
            let data = self.socket.recv_msg().await?;
            if collect_dump_messages(&data, seq, &mut responses)? {
                break;
            }
        }

        trace!(seq, count = responses.len(), "dump complete");
        Ok(responses)
    }

    /// Process an ACK response.
    fn process_ack(&self, data: &[u8], expected_seq: u32) -> Result<()> {
        for result in MessageIter::new(data) {
            let (header, payload) = result?;

            if header.nlmsg_seq != expected_seq {
                continue;
            }

            if header.is_error() {
                let err = NlMsgError::from_bytes(payload)?;
                if !err.is_ack() {
                    return Err(kernel_error(err, payload));
                }
                return Ok(());
            }
        }

        Err(Error::InvalidMessage("expected ACK message".into()))
    }
}

/// Turn an NLMSG_ERROR payload into an error, keeping the extended-ACK
/// text when the kernel attached one.
fn kernel_error(err: &NlMsgError, payload: &[u8]) -> Error {
    match err.ext_ack_msg(payload) {
        Some(text) => Error::from_errno_with_context(err.error, text),
        None => Error::from_errno(err.error),
    }
}

/// Scan one receive buffer for dump messages with the given sequence
/// number, appending data messages to `responses`. ACKs and foreign
/// sequence numbers are dropped. Returns true once NLMSG_DONE is seen.
fn collect_dump_messages(data: &[u8], seq: u32, responses: &mut Vec<Vec<u8>>) -> Result<bool> {
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != seq {
            continue;
        }

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if !err.is_ack() {
                return Err(kernel_error(err, payload));
            }
            // An errno-0 ACK carries no object.
            continue;
        }

        if header.is_done() {
            return Ok(true);
        }

        // Collect the full message (header + payload)
        let msg_len = header.nlmsg_len as usize;
        let msg_start = payload.as_ptr() as usize
            - data.as_ptr() as usize
            - std::mem::size_of::<NlMsgHdr>();
        if msg_start + msg_len <= data.len() {
            responses.push(data[msg_start..msg_start + msg_len].to_vec());
        }
    }

    Ok(false)
}

/// Helper to build a dump request.
pub fn dump_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP)
}

/// Helper to build a request expecting ACK.
pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}

/// Helper to build an exclusive create request.
pub fn create_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL)
}

/// Helper to build a create-or-replace request.
pub fn replace_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgType};

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn connection_is_send_sync() {
        assert_send::<Connection>();
        assert_sync::<Connection>();
    }

    fn message(msg_type: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut header = NlMsgHdr::new(msg_type, 0);
        header.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
        header.nlmsg_seq = seq;
        let mut buf = header.as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    fn error_payload(errno: i32) -> Vec<u8> {
        let mut payload = errno.to_ne_bytes().to_vec();
        payload.extend_from_slice(NlMsgHdr::new(NlMsgType::RTM_GETQDISC, 0).as_bytes());
        payload
    }

    #[test]
    fn ack_inside_dump_is_not_collected() {
        let seq = 9;
        let mut data = message(NlMsgType::ERROR, seq, &error_payload(0));
        data.extend_from_slice(&message(NlMsgType::RTM_NEWQDISC, seq, &[0u8; 20]));
        data.extend_from_slice(&message(NlMsgType::RTM_NEWQDISC, 77, &[0u8; 20]));
        data.extend_from_slice(&message(NlMsgType::DONE, seq, &[]));

        let mut responses = Vec::new();
        let done = collect_dump_messages(&data, seq, &mut responses).unwrap();
        assert!(done);
        assert_eq!(responses.len(), 1);
        let header = NlMsgHdr::from_bytes(&responses[0]).unwrap();
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_NEWQDISC);
        assert_eq!(header.nlmsg_seq, seq);
    }

    #[test]
    fn kernel_error_aborts_dump() {
        let seq = 3;
        let data = message(NlMsgType::ERROR, seq, &error_payload(-1));

        let mut responses = Vec::new();
        let err = collect_dump_messages(&data, seq, &mut responses).unwrap_err();
        assert!(err.is_permission_denied());
        assert!(responses.is_empty());
    }
}
