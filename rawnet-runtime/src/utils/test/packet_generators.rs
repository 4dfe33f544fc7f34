use rawnet_packets::*;
use std::convert::TryFrom;
use std::net::Ipv4Addr;

/// A broadcast who-has for `target_ip`.
pub fn arp_request_frame(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> PacketData {
    let request = ArpPacket::request(sender_mac, sender_ip, target_ip);
    frame(MacAddr::BROADCAST, sender_mac, ARP_ETHER_TYPE, request.as_bytes())
}

/// A unicast is-at telling `target_mac` that `sender_ip` lives at `sender_mac`.
pub fn arp_reply_frame(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> PacketData {
    let reply = ArpPacket::reply(sender_mac, sender_ip, target_mac, target_ip);
    frame(target_mac, sender_mac, ARP_ETHER_TYPE, reply.as_bytes())
}

/// A single unfragmented datagram from `src` to `dst`.
pub fn ipv4_frame(
    src: (MacAddr, Ipv4Addr),
    dst: (MacAddr, Ipv4Addr),
    protocol: IpProtocol,
    payload: &[u8],
) -> PacketData {
    let repr = Ipv4Repr {
        src_addr: src.1,
        dst_addr: dst.1,
        protocol,
        tos: 0,
        ttl: IPV4_DEFAULT_TTL,
        identification: 0x4242,
        dont_fragment: false,
        more_fragments: false,
        fragment_offset: 0,
        options: vec![],
    };
    match repr.emit(payload) {
        Ok(packet) => frame(dst.0, src.0, IPV4_ETHER_TYPE, &packet.data),
        Err(err) => panic!("test datagram does not fit: {}", err),
    }
}

pub fn icmp_echo_frame(
    src: (MacAddr, Ipv4Addr),
    dst: (MacAddr, Ipv4Addr),
    echo: &IcmpEcho,
) -> PacketData {
    ipv4_frame(src, dst, IpProtocol::ICMP, &echo.emit())
}

pub fn udp_frame(
    src: (MacAddr, Ipv4Addr, u16),
    dst: (MacAddr, Ipv4Addr, u16),
    data: &[u8],
) -> PacketData {
    match UdpSegment::new(src.2, dst.2, data) {
        Ok(segment) => ipv4_frame(
            (src.0, src.1),
            (dst.0, dst.1),
            IpProtocol::UDP,
            &segment.into_inner(),
        ),
        Err(err) => panic!("test segment does not fit: {}", err),
    }
}

/// The ARP message inside `frame`, if it carries one.
pub fn arp_in(frame: &[u8]) -> Option<ArpPacket> {
    let frame = EthernetFrame::from_buffer(frame.to_vec()).ok()?;
    if frame.ether_type() != ARP_ETHER_TYPE {
        return None;
    }
    ArpPacket::try_from(frame.payload()).ok()
}

/// The IPv4 datagram inside `frame`, if it carries one.
pub fn ipv4_in(frame: &[u8]) -> Option<Ipv4Packet> {
    let frame = EthernetFrame::from_buffer(frame.to_vec()).ok()?;
    if frame.ether_type() != IPV4_ETHER_TYPE {
        return None;
    }
    Ipv4Packet::from_buffer(frame.payload()).ok()
}

fn frame(dest: MacAddr, src: MacAddr, ether_type: u16, payload: &[u8]) -> PacketData {
    match EthernetFrame::new(dest, src, ether_type, payload) {
        Ok(frame) => frame.into_inner(),
        Err(err) => panic!("test frame does not fit: {}", err),
    }
}
