use thiserror::Error;

/// Failures while decoding a received packet or building one to send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("malformed {layer}: {reason}")]
    Decode {
        layer: &'static str,
        reason: &'static str,
    },

    #[error("{layer} checksum mismatch")]
    ChecksumMismatch { layer: &'static str },

    #[error("frame of {0} bytes exceeds the 1514 byte Ethernet maximum")]
    FrameTooLarge(usize),

    #[error("IPv4 header of {0} bytes exceeds the 60 byte maximum")]
    HeaderTooLarge(usize),

    #[error("datagram of {0} bytes does not fit a 16 bit length field")]
    DatagramTooLarge(usize),

    #[error("MTU of {mtu} bytes leaves no room for data behind a {header_len} byte IPv4 header")]
    MtuTooSmall { mtu: usize, header_len: usize },
}

impl PacketError {
    pub(crate) fn decode(layer: &'static str, reason: &'static str) -> PacketError {
        PacketError::Decode { layer, reason }
    }
}
