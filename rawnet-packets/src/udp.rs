use crate::*;

pub const UDP_HEADER_LEN: usize = 8;

/// A UDP header plus payload, without the IPv4 header around it. The checksum is carried but
/// never computed or verified: it is optional over IPv4 and is always sent as zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpSegment {
    pub data: PacketData,
}

impl UdpSegment {
    pub fn new(src_port: u16, dest_port: u16, payload: &[u8]) -> Result<UdpSegment, PacketError> {
        let length = UDP_HEADER_LEN + payload.len();
        if length > usize::from(u16::max_value()) {
            return Err(PacketError::DatagramTooLarge(length));
        }

        let mut data = Vec::with_capacity(length);
        data.extend_from_slice(&src_port.to_be_bytes());
        data.extend_from_slice(&dest_port.to_be_bytes());
        data.extend_from_slice(&(length as u16).to_be_bytes());
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(payload);
        Ok(UdpSegment { data })
    }

    /// Reads a segment out of an IPv4 payload, trimming it to its length field.
    pub fn from_buffer(data: &[u8]) -> Result<UdpSegment, PacketError> {
        if data.len() < UDP_HEADER_LEN {
            return Err(PacketError::decode("UDP segment", "shorter than 8 bytes"));
        }

        let length = usize::from(u16::from_be_bytes([data[4], data[5]]));
        if length < UDP_HEADER_LEN || length > data.len() {
            return Err(PacketError::decode(
                "UDP segment",
                "length field out of range",
            ));
        }

        Ok(UdpSegment {
            data: data[..length].to_vec(),
        })
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes([self.data[0], self.data[1]])
    }

    pub fn dest_port(&self) -> u16 {
        u16::from_be_bytes([self.data[2], self.data[3]])
    }

    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.data[4], self.data[5]])
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.data[6], self.data[7]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[UDP_HEADER_LEN..]
    }

    pub fn into_inner(self) -> PacketData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_segment() {
        let segment = UdpSegment::new(49152, 53, b"hello").unwrap();
        assert_eq!(
            segment.data,
            vec![0xc0, 0x00, 0x00, 0x35, 0x00, 0x0d, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o']
        );
        assert_eq!(segment.src_port(), 49152);
        assert_eq!(segment.dest_port(), 53);
        assert_eq!(segment.length(), 13);
        assert_eq!(segment.checksum(), 0);
        assert_eq!(segment.payload(), b"hello");
    }

    #[test]
    fn from_buffer_trims_to_length() {
        let mut data = UdpSegment::new(1, 2, &[9; 4]).unwrap().into_inner();
        data.extend_from_slice(&[0; 14]);
        let segment = UdpSegment::from_buffer(&data).unwrap();
        assert_eq!(segment.payload(), &[9; 4]);
    }

    #[test]
    fn checksum_field_is_not_verified() {
        let mut data = UdpSegment::new(1, 2, b"x").unwrap().into_inner();
        data[6] = 0xde;
        data[7] = 0xad;
        let segment = UdpSegment::from_buffer(&data).unwrap();
        assert_eq!(segment.checksum(), 0xdead);
    }

    #[test]
    fn bad_length_is_rejected() {
        let mut data = UdpSegment::new(1, 2, b"abc").unwrap().into_inner();
        data[5] = 12;
        assert!(UdpSegment::from_buffer(&data).is_err());
        data[5] = 7;
        assert!(UdpSegment::from_buffer(&data).is_err());
        assert!(UdpSegment::from_buffer(&data[..7]).is_err());
    }
}
