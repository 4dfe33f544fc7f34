use crate::*;
use std::convert::TryInto;
use std::net::Ipv4Addr;
use std::ops::Range;

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const IPV4_MAX_HEADER_LEN: usize = 60;
pub const IPV4_DEFAULT_TTL: u8 = 64;

const DF_BIT: u8 = 0x40;
const MF_BIT: u8 = 0x20;

/// A received IPv4 datagram, trimmed to its total length field so that Ethernet padding is gone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub data: PacketData,
}

impl Ipv4Packet {
    /// Checks version, header length and total length, but not the checksum: callers decide
    /// what to do about a bad checksum via `verify_checksum`.
    pub fn from_buffer(data: &[u8]) -> Result<Ipv4Packet, PacketError> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return Err(PacketError::decode(
                "IPv4 datagram",
                "shorter than the 20 byte minimum header",
            ));
        }

        let version = (data[0] & 0xF0) >> 4;
        if version != 4 {
            return Err(PacketError::decode("IPv4 datagram", "version is not 4"));
        }

        // This is the header length in 32bit words
        let header_len = usize::from(data[0] & 0x0F) * 4;
        if header_len < IPV4_MIN_HEADER_LEN || header_len > data.len() {
            return Err(PacketError::decode(
                "IPv4 datagram",
                "header length field out of range",
            ));
        }

        let total_len = usize::from(u16::from_be_bytes([data[2], data[3]]));
        if total_len < header_len || total_len > data.len() {
            return Err(PacketError::decode(
                "IPv4 datagram",
                "total length field out of range",
            ));
        }

        Ok(Ipv4Packet {
            data: data[..total_len].to_vec(),
        })
    }

    pub fn ihl(&self) -> u8 {
        self.data[0] & 0x0F
    }

    pub fn header_len(&self) -> usize {
        usize::from(self.ihl()) * 4
    }

    pub fn tos(&self) -> u8 {
        self.data[1]
    }

    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes([self.data[2], self.data[3]])
    }

    pub fn identification(&self) -> u16 {
        u16::from_be_bytes([self.data[4], self.data[5]])
    }

    /// Returns tuple of (Don't Fragment, More Fragments)
    pub fn flags(&self) -> (bool, bool) {
        let df = (self.data[6] & DF_BIT) != 0;
        let mf = (self.data[6] & MF_BIT) != 0;
        (df, mf)
    }

    /// Offset of this fragment's data in the original datagram, in units of 8 bytes.
    pub fn fragment_offset(&self) -> u16 {
        u16::from_be_bytes([self.data[6] & 0x1F, self.data[7]])
    }

    pub fn ttl(&self) -> u8 {
        self.data[8]
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from(self.data[9])
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.data[10], self.data[11]])
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        let octets: [u8; 4] = self.data[12..16].try_into().unwrap_or_default();
        Ipv4Addr::from(octets)
    }

    pub fn dest_addr(&self) -> Ipv4Addr {
        let octets: [u8; 4] = self.data[16..20].try_into().unwrap_or_default();
        Ipv4Addr::from(octets)
    }

    pub fn options(&self) -> &[u8] {
        &self.data[IPV4_MIN_HEADER_LEN..self.header_len()]
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.header_len()..]
    }

    /// The checksum over the whole header, received checksum field included, must come out 0.
    pub fn verify_checksum(&self) -> bool {
        checksum(&self.data[..self.header_len()]) == 0
    }
}

/// The fields needed to emit an IPv4 header. Total length and checksum are derived on emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Repr {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub protocol: IpProtocol,
    pub tos: u8,
    pub ttl: u8,
    pub identification: u16,
    pub dont_fragment: bool,
    pub more_fragments: bool,
    /// In units of 8 bytes.
    pub fragment_offset: u16,
    /// Raw option bytes; padded to a 32 bit boundary on emit.
    pub options: Vec<u8>,
}

impl Ipv4Repr {
    pub fn header_len(&self) -> usize {
        IPV4_MIN_HEADER_LEN + padded_options_len(&self.options)
    }

    /// Serializes header and payload, filling in total length and the header checksum.
    pub fn emit(&self, payload: &[u8]) -> Result<Ipv4Packet, PacketError> {
        let header_len = self.header_len();
        if header_len > IPV4_MAX_HEADER_LEN {
            return Err(PacketError::HeaderTooLarge(header_len));
        }
        let total_len = header_len + payload.len();
        if total_len > usize::from(u16::max_value()) {
            return Err(PacketError::DatagramTooLarge(total_len));
        }

        let mut data = vec![0u8; header_len];
        data[0] = 0x40 | (header_len / 4) as u8;
        data[1] = self.tos;
        data[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
        data[4..6].copy_from_slice(&self.identification.to_be_bytes());
        let mut flags_and_offset = self.fragment_offset & 0x1FFF;
        if self.dont_fragment {
            flags_and_offset |= u16::from(DF_BIT) << 8;
        }
        if self.more_fragments {
            flags_and_offset |= u16::from(MF_BIT) << 8;
        }
        data[6..8].copy_from_slice(&flags_and_offset.to_be_bytes());
        data[8] = self.ttl;
        data[9] = self.protocol.into();
        data[12..16].copy_from_slice(&self.src_addr.octets());
        data[16..20].copy_from_slice(&self.dst_addr.octets());
        data[IPV4_MIN_HEADER_LEN..IPV4_MIN_HEADER_LEN + self.options.len()]
            .copy_from_slice(&self.options);

        let header_checksum = checksum(&data);
        data[10..12].copy_from_slice(&header_checksum.to_be_bytes());

        data.reserve_exact(payload.len());
        data.extend_from_slice(payload);
        Ok(Ipv4Packet { data })
    }
}

fn padded_options_len(options: &[u8]) -> usize {
    (options.len() + 3) & !3
}

/// One slice of an outbound datagram's payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// In units of 8 bytes.
    pub offset: u16,
    pub range: Range<usize>,
    pub more_fragments: bool,
}

/// The largest fragment payload that fits `mtu` behind a header of `header_len` bytes. Every
/// fragment but the last must carry a multiple of 8 bytes, since offsets count 8 byte units.
///
/// Fails with `MtuTooSmall` when not even 8 bytes fit.
pub fn max_fragment_payload(mtu: usize, header_len: usize) -> Result<usize, PacketError> {
    match mtu.saturating_sub(header_len) & !7 {
        0 => Err(PacketError::MtuTooSmall { mtu, header_len }),
        budget => Ok(budget),
    }
}

/// Splits a payload of `payload_len` bytes into `ceil(payload_len / max_payload)` fragments.
/// An empty payload still yields one (empty) fragment so the datagram is sent.
///
/// `max_payload` must be a non-zero multiple of 8, as returned by `max_fragment_payload`.
pub fn fragments(payload_len: usize, max_payload: usize) -> Vec<Fragment> {
    debug_assert!(max_payload > 0 && max_payload % 8 == 0);
    if payload_len == 0 {
        return vec![Fragment {
            offset: 0,
            range: 0..0,
            more_fragments: false,
        }];
    }

    (0..payload_len)
        .step_by(max_payload)
        .map(|start| {
            let end = (start + max_payload).min(payload_len);
            Fragment {
                offset: (start / 8) as u16,
                range: start..end,
                more_fragments: end < payload_len,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repr() -> Ipv4Repr {
        Ipv4Repr {
            src_addr: Ipv4Addr::new(192, 168, 0, 1),
            dst_addr: Ipv4Addr::new(192, 168, 0, 199),
            protocol: IpProtocol::UDP,
            tos: 0,
            ttl: 64,
            identification: 0,
            dont_fragment: true,
            more_fragments: false,
            fragment_offset: 0,
            options: vec![],
        }
    }

    #[test]
    fn ipv4_packet() {
        let ip_data: Vec<u8> = vec![
            0x45, 0, 0, 20, 0, 0, 0, 0, 64, 17, 0, 0, 192, 178, 128, 0, 10, 0, 0, 1,
        ];

        let packet = Ipv4Packet::from_buffer(&ip_data).unwrap();

        assert_eq!(packet.src_addr(), Ipv4Addr::new(192, 178, 128, 0));
        assert_eq!(packet.dest_addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(packet.ihl(), 5);
        assert_eq!(packet.payload().len(), 0);
        assert!(packet.options().is_empty());
        assert_eq!(packet.protocol(), IpProtocol::UDP);
        assert_eq!(packet.total_len(), 20);
        assert_eq!(packet.ttl(), 64);
        assert_eq!(packet.checksum(), 0);
        assert_eq!(packet.identification(), 0);
        assert_eq!(packet.fragment_offset(), 0);
        assert_eq!(packet.flags(), (false, false));
    }

    #[test]
    fn validate_checksum() {
        let invalid_checksum_data: Vec<u8> = vec![
            0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let packet = Ipv4Packet::from_buffer(&invalid_checksum_data).unwrap();
        assert!(!packet.verify_checksum());

        let valid_checksum_data: Vec<u8> = vec![
            0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0xc0, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let packet = Ipv4Packet::from_buffer(&valid_checksum_data).unwrap();
        assert!(packet.verify_checksum());
    }

    #[test]
    fn emit_matches_known_header() {
        let packet = repr().emit(&[]).unwrap();
        assert_eq!(
            packet.data,
            vec![
                0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0xc0, 0xc0,
                0xa8, 0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
            ]
        );
    }

    #[test]
    fn emit_then_parse_with_options() {
        let mut repr = repr();
        // Record route, truncated to 5 bytes so it needs padding
        repr.options = vec![0x07, 0x07, 0x04, 0x00, 0x00];
        repr.more_fragments = true;
        repr.dont_fragment = false;
        repr.fragment_offset = 185;
        repr.identification = 0xbeef;

        let packet = repr.emit(&[1, 2, 3]).unwrap();
        assert_eq!(packet.header_len(), 28);
        assert_eq!(packet.total_len(), 31);
        assert!(packet.verify_checksum());

        let parsed = Ipv4Packet::from_buffer(&packet.data).unwrap();
        assert_eq!(parsed.options(), &[0x07, 0x07, 0x04, 0x00, 0x00, 0, 0, 0]);
        assert_eq!(parsed.flags(), (false, true));
        assert_eq!(parsed.fragment_offset(), 185);
        assert_eq!(parsed.identification(), 0xbeef);
        assert_eq!(parsed.payload(), &[1, 2, 3]);
    }

    #[test]
    fn emit_refuses_oversized_header() {
        let mut repr = repr();
        repr.options = vec![1; 41];
        assert_eq!(repr.emit(&[]), Err(PacketError::HeaderTooLarge(64)));
    }

    #[test]
    fn padding_past_total_len_is_dropped() {
        let mut data = repr().emit(&[9; 6]).unwrap().data;
        data.resize(46, 0);
        let packet = Ipv4Packet::from_buffer(&data).unwrap();
        assert_eq!(packet.payload(), &[9; 6]);
    }

    #[test]
    fn rejects_bad_lengths() {
        let good = repr().emit(&[]).unwrap().data;

        let mut bad_version = good.clone();
        bad_version[0] = 0x65;
        assert!(Ipv4Packet::from_buffer(&bad_version).is_err());

        let mut short_ihl = good.clone();
        short_ihl[0] = 0x44;
        assert!(Ipv4Packet::from_buffer(&short_ihl).is_err());

        let mut long_total = good.clone();
        long_total[3] = 21;
        assert!(Ipv4Packet::from_buffer(&long_total).is_err());

        assert!(Ipv4Packet::from_buffer(&good[..19]).is_err());
    }

    #[test]
    fn fragment_budget_is_multiple_of_eight() {
        assert_eq!(max_fragment_payload(1500, 20), Ok(1480));
        assert_eq!(max_fragment_payload(1500, 24), Ok(1472));
        assert_eq!(max_fragment_payload(1500, 60), Ok(1440));
        assert_eq!(max_fragment_payload(576, 20), Ok(552));
        assert_eq!(max_fragment_payload(28, 20), Ok(8));
    }

    #[test]
    fn mtu_below_one_block_is_refused() {
        assert_eq!(
            max_fragment_payload(27, 20),
            Err(PacketError::MtuTooSmall {
                mtu: 27,
                header_len: 20
            })
        );
        assert!(max_fragment_payload(0, 20).is_err());
        assert!(max_fragment_payload(64, 60).is_err());
    }

    #[test]
    fn fragments_cover_payload() {
        let plan = fragments(3000, 1480);
        assert_eq!(
            plan,
            vec![
                Fragment {
                    offset: 0,
                    range: 0..1480,
                    more_fragments: true
                },
                Fragment {
                    offset: 185,
                    range: 1480..2960,
                    more_fragments: true
                },
                Fragment {
                    offset: 370,
                    range: 2960..3000,
                    more_fragments: false
                },
            ]
        );
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let plan = fragments(2960, 1480);
        assert_eq!(plan.len(), 2);
        assert!(!plan[1].more_fragments);
        assert_eq!(plan[1].range, 1480..2960);
    }

    #[test]
    fn empty_payload_is_one_fragment() {
        let plan = fragments(0, 1480);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].range, 0..0);
        assert!(!plan[0].more_fragments);
    }
}
