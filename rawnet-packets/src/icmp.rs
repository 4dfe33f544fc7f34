use crate::*;
use std::convert::TryFrom;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_HEADER_LEN: usize = 8;

/// An ICMP message in the echo layout: type, code, checksum, identifier, sequence, then data
/// that a responder copies back verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IcmpEcho {
    pub msg_type: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    pub data: Vec<u8>,
}

impl IcmpEcho {
    pub fn request(identifier: u16, sequence: u16, data: &[u8]) -> IcmpEcho {
        IcmpEcho {
            msg_type: ICMP_ECHO_REQUEST,
            code: 0,
            identifier,
            sequence,
            data: data.to_vec(),
        }
    }

    /// The reply a responder sends back for this message.
    pub fn reply(&self) -> IcmpEcho {
        IcmpEcho {
            msg_type: ICMP_ECHO_REPLY,
            code: 0,
            identifier: self.identifier,
            sequence: self.sequence,
            data: self.data.clone(),
        }
    }

    pub fn is_request(&self) -> bool {
        self.msg_type == ICMP_ECHO_REQUEST
    }

    pub fn is_reply(&self) -> bool {
        self.msg_type == ICMP_ECHO_REPLY
    }

    /// Serializes the message with its checksum patched in over the whole message.
    pub fn emit(&self) -> PacketData {
        let mut message = Vec::with_capacity(ICMP_HEADER_LEN + self.data.len());
        message.push(self.msg_type);
        message.push(self.code);
        message.extend_from_slice(&[0, 0]);
        message.extend_from_slice(&self.identifier.to_be_bytes());
        message.extend_from_slice(&self.sequence.to_be_bytes());
        message.extend_from_slice(&self.data);

        let message_checksum = checksum(&message);
        message[2..4].copy_from_slice(&message_checksum.to_be_bytes());
        message
    }
}

impl TryFrom<&[u8]> for IcmpEcho {
    type Error = PacketError;

    /// Parses any message long enough for the echo header. Type is not checked here, so the
    /// caller can decide how to treat the types it doesn't handle.
    fn try_from(message: &[u8]) -> Result<Self, Self::Error> {
        if message.len() < ICMP_HEADER_LEN {
            return Err(PacketError::decode("ICMP message", "shorter than 8 bytes"));
        }
        if checksum(message) != 0 {
            return Err(PacketError::ChecksumMismatch {
                layer: "ICMP message",
            });
        }

        Ok(IcmpEcho {
            msg_type: message[0],
            code: message[1],
            identifier: u16::from_be_bytes([message[4], message[5]]),
            sequence: u16::from_be_bytes([message[6], message[7]]),
            data: message[ICMP_HEADER_LEN..].to_vec(),
        })
    }
}
