use crate::*;
use std::convert::{TryFrom, TryInto};

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERNET_MIN_FRAME_LEN: usize = 60;
pub const ETHERNET_MAX_FRAME_LEN: usize = 1514;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthernetFrame {
    pub data: PacketData,
}

impl EthernetFrame {
    /// Builds a frame ready to be injected. Frames shorter than the 60 byte minimum are padded
    /// with zeros; frames longer than 1514 bytes are refused rather than truncated.
    pub fn new(
        dest: MacAddr,
        src: MacAddr,
        ether_type: u16,
        payload: &[u8],
    ) -> Result<EthernetFrame, PacketError> {
        let len = ETHERNET_HEADER_LEN + payload.len();
        if len > ETHERNET_MAX_FRAME_LEN {
            return Err(PacketError::FrameTooLarge(len));
        }

        let mut data = Vec::with_capacity(len.max(ETHERNET_MIN_FRAME_LEN));
        data.extend_from_slice(&dest.bytes);
        data.extend_from_slice(&src.bytes);
        data.extend_from_slice(&ether_type.to_be_bytes());
        data.extend_from_slice(payload);
        if data.len() < ETHERNET_MIN_FRAME_LEN {
            data.resize(ETHERNET_MIN_FRAME_LEN, 0);
        }

        Ok(EthernetFrame { data })
    }

    pub fn from_buffer(frame: PacketData) -> Result<EthernetFrame, PacketError> {
        // Ethernet II frames must be at least the header, which is 14bytes
        // 0                    6                    12                      14
        // |---6 byte Dest_MAC--|---6 byte Src_MAC---|--2 Byte EtherType---|
        if frame.len() < ETHERNET_HEADER_LEN {
            return Err(PacketError::decode(
                "Ethernet frame",
                "less than the minimum of 14 bytes",
            ));
        }

        Ok(EthernetFrame { data: frame })
    }

    pub fn dest_mac(&self) -> MacAddr {
        let bytes = <[u8; 6]>::try_from(&self.data[0..6]).unwrap_or_default();
        MacAddr::new(bytes)
    }

    pub fn src_mac(&self) -> MacAddr {
        let bytes = <[u8; 6]>::try_from(&self.data[6..12]).unwrap_or_default();
        MacAddr::new(bytes)
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) {
        self.data[..6].copy_from_slice(&mac.bytes);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.data[6..12].copy_from_slice(&mac.bytes);
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.data[12..14].try_into().unwrap_or_default())
    }

    pub fn set_ether_type(&mut self, ether_type: u16) {
        self.data[12..14].copy_from_slice(&ether_type.to_be_bytes());
    }

    /// Everything after the header, including any zero padding. Upper layers strip padding with
    /// their own length fields.
    pub fn payload(&self) -> &[u8] {
        &self.data[ETHERNET_HEADER_LEN..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> PacketData {
        self.data
    }
}

impl AsRef<[u8]> for EthernetFrame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    const DEST: MacAddr = MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0xff, 0xff]);
    const SRC: MacAddr = MacAddr::new([1, 2, 3, 4, 5, 6]);

    #[test]
    fn ethernet_frame() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0, 0];
        let frame = EthernetFrame::from_buffer(data).unwrap();
        assert_eq!(frame.dest_mac(), DEST);
        assert_eq!(frame.src_mac(), SRC);
        assert_eq!(frame.ether_type(), 0);
        assert_eq!(frame.payload().len(), 0);
    }

    #[test]
    fn invalid_data_length() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6];
        assert_eq!(
            EthernetFrame::from_buffer(data),
            Err(PacketError::Decode {
                layer: "Ethernet frame",
                reason: "less than the minimum of 14 bytes"
            })
        );
    }

    #[test]
    fn short_payload_is_padded_to_minimum() {
        let payload = [0xaa; 10];
        let frame = EthernetFrame::new(DEST, SRC, ARP_ETHER_TYPE, &payload).unwrap();
        assert_eq!(frame.len(), ETHERNET_MIN_FRAME_LEN);
        assert_eq!(&frame.payload()[..10], &payload);
        assert!(frame.data[24..].iter().all(|b| *b == 0));
    }

    #[test]
    fn full_payload_is_not_padded() {
        let payload = vec![7; 1500];
        let frame = EthernetFrame::new(DEST, SRC, IPV4_ETHER_TYPE, &payload).unwrap();
        assert_eq!(frame.len(), ETHERNET_MAX_FRAME_LEN);
    }

    #[test]
    fn oversized_payload_is_refused() {
        let payload = vec![7; 1501];
        assert_eq!(
            EthernetFrame::new(DEST, SRC, IPV4_ETHER_TYPE, &payload),
            Err(PacketError::FrameTooLarge(1515))
        );
    }

    #[test]
    fn header_fields_are_written() {
        let frame = EthernetFrame::new(DEST, SRC, 0x0806, &[1, 2, 3]).unwrap();
        assert_eq!(frame.dest_mac(), DEST);
        assert_eq!(frame.src_mac(), SRC);
        assert_eq!(frame.ether_type(), 0x0806);
        assert_eq!(&frame.data[12..14], &[0x08, 0x06]);
    }

    #[test]
    fn set_dest_mac() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0, 0];
        let mut frame = EthernetFrame::from_buffer(data).unwrap();
        let new_dest = MacAddr::new([0x98, 0x88, 0x18, 0x12, 0xb4, 0xdf]);
        frame.set_dest_mac(new_dest);
        assert_eq!(frame.dest_mac(), new_dest);
    }

    #[test]
    fn set_ether_type() {
        let mut frame = EthernetFrame::new(DEST, SRC, 0, &[]).unwrap();
        frame.set_ether_type(0xffff);
        assert_eq!(frame.ether_type(), 0xffff);
    }
}
