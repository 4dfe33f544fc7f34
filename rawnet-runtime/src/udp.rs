use crate::ipv4::{IpMeta, Ipv4Layer};
use crate::StackError;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use rand::Rng;
use rawnet_packets::{IpProtocol, UdpSegment};
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;
use tracing::debug;

/// Start of the IANA dynamic port range, which runs to 65535.
const EPHEMERAL_PORT_MIN: u16 = 49152;
const DATAGRAM_QUEUE_DEPTH: usize = 256;

/// A received UDP datagram, header fields as they were on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpDatagram {
    pub from: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
    pub data: Vec<u8>,
}

pub struct Udp {
    ip: Arc<Ipv4Layer>,
    datagrams: Sender<UdpDatagram>,
    datagram_receiver: Receiver<UdpDatagram>,
}

impl Udp {
    pub fn new(ip: Arc<Ipv4Layer>) -> Arc<Udp> {
        let (datagrams, datagram_receiver) = channel::bounded(DATAGRAM_QUEUE_DEPTH);
        Arc::new(Udp {
            ip,
            datagrams,
            datagram_receiver,
        })
    }

    /// Registers this layer's receive handler for IP protocol 17.
    pub fn attach(self: &Arc<Self>) {
        let udp = Arc::downgrade(self);
        self.ip
            .protocols()
            .register(IpProtocol::UDP, move |payload: &[u8], meta: &IpMeta| {
                if let Some(udp) = udp.upgrade() {
                    if let Err(err) = udp.on_datagram(payload, meta) {
                        debug!(error = %err, src = %meta.src, "dropping UDP datagram");
                    }
                }
            });
    }

    /// Every datagram received, in arrival order.
    pub fn datagrams(&self) -> Receiver<UdpDatagram> {
        self.datagram_receiver.clone()
    }

    /// Sends `data` to `dst_port` on `dst` from a fresh ephemeral port, which is returned.
    pub fn send(&self, data: &[u8], dst_port: u16, dst: Ipv4Addr) -> Result<u16, StackError> {
        let src_port = ephemeral_port();
        let segment = UdpSegment::new(src_port, dst_port, data)?;
        self.ip.send(dst, &segment.into_inner(), IpProtocol::UDP)?;
        Ok(src_port)
    }

    pub fn on_datagram(&self, payload: &[u8], meta: &IpMeta) -> Result<(), StackError> {
        let segment = UdpSegment::from_buffer(payload)?;
        debug!(
            src = %meta.src,
            src_port = segment.src_port(),
            dst_port = segment.dest_port(),
            len = segment.payload().len(),
            "received UDP datagram"
        );

        let datagram = UdpDatagram {
            from: meta.src,
            src_port: segment.src_port(),
            dst_port: segment.dest_port(),
            length: segment.length(),
            checksum: segment.checksum(),
            data: segment.payload().to_vec(),
        };
        if let Err(TrySendError::Full(datagram)) = self.datagrams.try_send(datagram) {
            debug!(src = %datagram.from, "UDP queue full, dropping datagram");
        }
        Ok(())
    }
}

/// A source port nothing else on this host is using right now: the kernel picks one for a
/// socket bound to port 0. Falls back to a random port from the dynamic range.
pub fn ephemeral_port() -> u16 {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| socket.local_addr())
        .map(|addr| addr.port())
        .unwrap_or_else(|_| {
            let port: u32 = rand::thread_rng().gen_range(u32::from(EPHEMERAL_PORT_MIN), 1 << 16);
            port as u16
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_port_is_nonzero() {
        assert_ne!(ephemeral_port(), 0);
    }

    #[test]
    fn received_datagram_is_queued() {
        use crate::arp::{Arp, ArpConfig};
        use crate::clock::ManualClock;
        use crate::device::InterfaceInfo;
        use crate::ethernet::EthernetLayer;
        use crate::ipv4::Ipv4Config;
        use crate::utils::test::memory_device::memory_device;
        use rawnet_packets::MacAddr;
        use std::time::Duration;

        let mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        let interface = InterfaceInfo {
            name: String::from("test0"),
            mac,
            ip: Ipv4Addr::new(10, 0, 0, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: None,
            mtu: 1500,
        };
        let (device, _handle) = memory_device();
        let ethernet = Arc::new(EthernetLayer::new(Arc::new(device), mac, 1500));
        let arp = Arp::new(
            ethernet.clone(),
            interface.ip,
            ArpConfig::new(),
            Arc::new(ManualClock::default()),
        );
        let ip = Ipv4Layer::new(ethernet, arp, interface, Ipv4Config::default()).unwrap();
        let udp = Udp::new(ip);

        let mut segment = UdpSegment::new(5353, 9999, b"hola").unwrap().into_inner();
        segment[6] = 0x12;
        segment[7] = 0x34;
        let meta = IpMeta {
            src: Ipv4Addr::new(10, 0, 0, 2),
            dst: Ipv4Addr::new(10, 0, 0, 1),
            timestamp: Duration::from_secs(0),
        };
        udp.on_datagram(&segment, &meta).unwrap();

        assert_eq!(
            udp.datagrams().try_recv().unwrap(),
            UdpDatagram {
                from: Ipv4Addr::new(10, 0, 0, 2),
                src_port: 5353,
                dst_port: 9999,
                length: 12,
                checksum: 0x1234,
                data: b"hola".to_vec(),
            }
        );
    }
}
