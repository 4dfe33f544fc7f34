use crate::*;
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

pub enum ArpHardwareType {
    Ethernet = 1,
}

/// Length of an ARP message for IPv4 over Ethernet.
pub const ARP_PACKET_LEN: usize = 28;

/// Hardware type, protocol type and both address lengths: the part of every ARP message that is
/// fixed for IPv4 over Ethernet.
pub const ARP_PREAMBLE: [u8; 6] = [0x00, 0x01, 0x08, 0x00, 0x06, 0x04];

const HARDWARE_TYPE_RANGE: (usize, usize) = (0, 2);
const PROTOCOL_TYPE_RANGE: (usize, usize) = (2, 4);
const HARDWARE_ADDR_LEN_INDEX: usize = 4;
const PROTOCOL_ADDR_LEN_INDEX: usize = 5;
const OPCODE_RANGE: (usize, usize) = (6, 8);
const SENDER_HARDWARE_ADDR_RANGE: (usize, usize) = (8, 14);
const SENDER_PROTOCOL_ADDR_RANGE: (usize, usize) = (14, 18);
const TARGET_HARDWARE_ADDR_RANGE: (usize, usize) = (18, 24);
const TARGET_PROTOCOL_ADDR_RANGE: (usize, usize) = (24, 28);

///
/// Getters/setters for the packet structure described in RFC 826, restricted to resolving IPv4
/// addresses to Ethernet addresses.
/// https://tools.ietf.org/html/rfc826
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    data: PacketData,
}

impl ArpPacket {
    pub fn new(
        op: ArpOp,
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        let mut data = vec![0; ARP_PACKET_LEN];
        data[..ARP_PREAMBLE.len()].copy_from_slice(&ARP_PREAMBLE);

        let mut packet = ArpPacket { data };
        packet.set_opcode(op as u16);
        packet.set_sender_hardware_addr(sender_mac);
        packet.set_sender_protocol_addr(sender_ip);
        packet.set_target_hardware_addr(target_mac);
        packet.set_target_protocol_addr(target_ip);
        packet
    }

    /// A who-has request. The target hardware address is the thing being asked for, so it is
    /// left zeroed.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpPacket::new(
            ArpOp::Request,
            sender_mac,
            sender_ip,
            MacAddr::UNSPECIFIED,
            target_ip,
        )
    }

    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        ArpPacket::new(ArpOp::Reply, sender_mac, sender_ip, target_mac, target_ip)
    }

    pub fn hardware_type(&self) -> u16 {
        self.u16_at(HARDWARE_TYPE_RANGE)
    }

    pub fn protocol_type(&self) -> u16 {
        self.u16_at(PROTOCOL_TYPE_RANGE)
    }

    pub fn hardware_addr_len(&self) -> u8 {
        self.data[HARDWARE_ADDR_LEN_INDEX]
    }

    pub fn protocol_addr_len(&self) -> u8 {
        self.data[PROTOCOL_ADDR_LEN_INDEX]
    }

    pub fn opcode(&self) -> u16 {
        self.u16_at(OPCODE_RANGE)
    }

    pub fn sender_hardware_addr(&self) -> MacAddr {
        self.mac_at(SENDER_HARDWARE_ADDR_RANGE)
    }

    pub fn sender_protocol_addr(&self) -> Ipv4Addr {
        self.ipv4_at(SENDER_PROTOCOL_ADDR_RANGE)
    }

    pub fn target_hardware_addr(&self) -> MacAddr {
        self.mac_at(TARGET_HARDWARE_ADDR_RANGE)
    }

    pub fn target_protocol_addr(&self) -> Ipv4Addr {
        self.ipv4_at(TARGET_PROTOCOL_ADDR_RANGE)
    }

    pub fn set_opcode(&mut self, code: u16) {
        self.set_arp_data(&code.to_be_bytes(), OPCODE_RANGE);
    }

    pub fn set_sender_hardware_addr(&mut self, addr: MacAddr) {
        self.set_arp_data(&addr.bytes, SENDER_HARDWARE_ADDR_RANGE);
    }

    pub fn set_sender_protocol_addr(&mut self, addr: Ipv4Addr) {
        self.set_arp_data(&addr.octets(), SENDER_PROTOCOL_ADDR_RANGE);
    }

    pub fn set_target_hardware_addr(&mut self, addr: MacAddr) {
        self.set_arp_data(&addr.bytes, TARGET_HARDWARE_ADDR_RANGE);
    }

    pub fn set_target_protocol_addr(&mut self, addr: Ipv4Addr) {
        self.set_arp_data(&addr.octets(), TARGET_PROTOCOL_ADDR_RANGE);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn u16_at(&self, (start, end): (usize, usize)) -> u16 {
        u16::from_be_bytes(self.data[start..end].try_into().unwrap_or_default())
    }

    fn mac_at(&self, (start, end): (usize, usize)) -> MacAddr {
        MacAddr::new(self.data[start..end].try_into().unwrap_or_default())
    }

    fn ipv4_at(&self, (start, end): (usize, usize)) -> Ipv4Addr {
        let octets: [u8; 4] = self.data[start..end].try_into().unwrap_or_default();
        Ipv4Addr::from(octets)
    }

    fn set_arp_data(&mut self, bytes: &[u8], (start, end): (usize, usize)) {
        self.data[start..end].copy_from_slice(bytes);
    }
}

impl TryFrom<&[u8]> for ArpPacket {
    type Error = PacketError;

    ///
    /// Reads an ARP message out of an Ethernet payload.
    /// Validates
    /// - The payload holds at least the 28 bytes of an IPv4 over Ethernet message
    /// - The hardware/protocol types and address lengths are Ethernet/IPv4
    /// Anything past the 28th byte is Ethernet padding and is ignored.
    ///
    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < ARP_PACKET_LEN {
            return Err(PacketError::decode("ARP message", "shorter than 28 bytes"));
        }
        if payload[..ARP_PREAMBLE.len()] != ARP_PREAMBLE {
            return Err(PacketError::decode(
                "ARP message",
                "not an Ethernet/IPv4 hardware and protocol preamble",
            ));
        }

        Ok(ArpPacket {
            data: payload[..ARP_PACKET_LEN].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request() {
        let mac = MacAddr::new([1, 2, 3, 4, 5, 6]);
        let request =
            ArpPacket::request(mac, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(request.hardware_type(), ArpHardwareType::Ethernet as u16);
        assert_eq!(request.protocol_type(), IPV4_ETHER_TYPE);
        assert_eq!(request.hardware_addr_len(), 6);
        assert_eq!(request.protocol_addr_len(), 4);
        assert_eq!(request.opcode(), ArpOp::Request as u16);
        assert_eq!(request.sender_hardware_addr(), mac);
        assert_eq!(request.sender_protocol_addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(request.target_hardware_addr(), MacAddr::UNSPECIFIED);
        assert_eq!(request.target_protocol_addr(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(request.as_bytes().len(), ARP_PACKET_LEN);
    }

    #[test]
    fn arp_packet_from_ethernet_payload() {
        let mut payload: Vec<u8> = vec![
            0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02, 1, 2, 3, 4, 5, 6, 10, 0, 0, 2, 10, 9,
            8, 7, 6, 5, 10, 0, 0, 1,
        ];
        // Ethernet minimum frame padding
        payload.resize(46, 0);

        let packet = ArpPacket::try_from(&payload[..]).unwrap();
        assert_eq!(packet.opcode(), ArpOp::Reply as u16);
        assert_eq!(packet.sender_hardware_addr(), MacAddr::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(packet.sender_protocol_addr(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(
            packet.target_hardware_addr(),
            MacAddr::new([10, 9, 8, 7, 6, 5])
        );
        assert_eq!(packet.target_protocol_addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(packet.as_bytes(), &payload[..ARP_PACKET_LEN]);
    }

    #[test]
    fn rejects_short_payload() {
        let payload = [0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01];
        assert!(ArpPacket::try_from(&payload[..]).is_err());
    }

    #[test]
    fn rejects_foreign_preamble() {
        let mut payload = ArpPacket::request(
            MacAddr::new([1, 2, 3, 4, 5, 6]),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        )
        .as_bytes()
        .to_vec();
        // IPv6 protocol type
        payload[2] = 0x86;
        payload[3] = 0xdd;
        assert!(ArpPacket::try_from(&payload[..]).is_err());
    }
}
