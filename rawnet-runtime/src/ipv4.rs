use crate::arp::Arp;
use crate::device::InterfaceInfo;
use crate::ethernet::{EthernetLayer, LinkMeta};
use crate::registry::Registry;
use crate::StackError;
use rawnet_packets::*;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Frames never carry more than this, whatever the interface MTU says.
const MAX_LINK_MTU: usize = 1500;

/// What the IPv4 layer hands up alongside a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpMeta {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub timestamp: Duration,
}

/// Per-stack header settings for outbound datagrams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Config {
    pub ttl: u8,
    pub tos: u8,
    /// Raw option bytes, sent with every datagram.
    pub options: Vec<u8>,
}

impl Default for Ipv4Config {
    fn default() -> Self {
        Ipv4Config {
            ttl: IPV4_DEFAULT_TTL,
            tos: 0,
            options: vec![],
        }
    }
}

pub struct Ipv4Layer {
    ethernet: Arc<EthernetLayer>,
    arp: Arc<Arp>,
    interface: InterfaceInfo,
    ttl: u8,
    tos: u8,
    /// Padded to a 32 bit boundary.
    options: Vec<u8>,
    identification: AtomicU16,
    protocols: Registry<IpProtocol, IpMeta>,
}

impl Ipv4Layer {
    /// Fails with `HeaderTooLarge` if the options cannot fit in a 60 byte header, and with
    /// `MtuTooSmall` if the link cannot carry any data behind that header.
    pub fn new(
        ethernet: Arc<EthernetLayer>,
        arp: Arc<Arp>,
        interface: InterfaceInfo,
        config: Ipv4Config,
    ) -> Result<Arc<Ipv4Layer>, StackError> {
        let options = pad_options(&config.options)?;
        fragment_budget(ethernet.mtu(), IPV4_MIN_HEADER_LEN + options.len())?;
        Ok(Arc::new(Ipv4Layer {
            ethernet,
            arp,
            interface,
            ttl: config.ttl,
            tos: config.tos,
            options,
            identification: AtomicU16::new(0),
            protocols: Registry::new("ip protocol"),
        }))
    }

    /// Registers this layer's receive handler for Ethertype 0x0800.
    pub fn attach(self: &Arc<Self>) {
        let ip = Arc::downgrade(self);
        self.ethernet
            .protocols()
            .register(IPV4_ETHER_TYPE, move |payload: &[u8], meta: &LinkMeta| {
                if let Some(ip) = ip.upgrade() {
                    if let Err(err) = ip.on_datagram(payload, meta) {
                        debug!(error = %err, src = %meta.src, "dropping IPv4 datagram");
                    }
                }
            });
    }

    pub fn local_addr(&self) -> Ipv4Addr {
        self.interface.ip
    }

    pub fn header_len(&self) -> usize {
        IPV4_MIN_HEADER_LEN + self.options.len()
    }

    pub fn protocols(&self) -> &Registry<IpProtocol, IpMeta> {
        &self.protocols
    }

    /// Where a datagram for `dst` is sent first: `dst` itself when it is on our subnet, the
    /// default gateway otherwise.
    pub fn next_hop(&self, dst: Ipv4Addr) -> Result<Ipv4Addr, StackError> {
        if self.interface.on_link(dst) {
            Ok(dst)
        } else {
            self.interface
                .gateway
                .ok_or(StackError::ResolutionFailed(dst))
        }
    }

    /// Sends `payload` to `dst`, fragmenting as needed.
    ///
    /// All fragments share one identification value, and only the last has MF clear. Nothing
    /// is sent if the next hop cannot be resolved.
    pub fn send(
        &self,
        dst: Ipv4Addr,
        payload: &[u8],
        protocol: IpProtocol,
    ) -> Result<(), StackError> {
        let header_len = self.header_len();
        if header_len > IPV4_MAX_HEADER_LEN {
            return Err(PacketError::HeaderTooLarge(header_len).into());
        }
        let total_len = header_len + payload.len();
        if total_len > usize::from(u16::max_value()) {
            return Err(PacketError::DatagramTooLarge(total_len).into());
        }
        let max_payload = fragment_budget(self.ethernet.mtu(), header_len)?;

        let hop = self.next_hop(dst)?;
        let mac = self
            .arp
            .resolve(hop)?
            .ok_or(StackError::ResolutionFailed(hop))?;

        let identification = self.identification.fetch_add(1, Ordering::Relaxed);
        let plan = fragments(payload.len(), max_payload);
        trace!(
            dst = %dst,
            via = %mac,
            identification,
            fragments = plan.len(),
            "sending IPv4 datagram"
        );

        for fragment in plan {
            let repr = Ipv4Repr {
                src_addr: self.interface.ip,
                dst_addr: dst,
                protocol,
                tos: self.tos,
                ttl: self.ttl,
                identification,
                dont_fragment: false,
                more_fragments: fragment.more_fragments,
                fragment_offset: fragment.offset,
                options: self.options.clone(),
            };
            let packet = repr.emit(&payload[fragment.range])?;
            self.ethernet.send(mac, IPV4_ETHER_TYPE, &packet.data)?;
        }
        Ok(())
    }

    /// Validates a received datagram and dispatches its payload by protocol number.
    ///
    /// Datagrams with a bad header checksum are dropped, as is every fragment but the first:
    /// there is no reassembly.
    pub fn on_datagram(&self, data: &[u8], meta: &LinkMeta) -> Result<(), StackError> {
        let packet = Ipv4Packet::from_buffer(data)?;
        if !packet.verify_checksum() {
            return Err(PacketError::ChecksumMismatch {
                layer: "IPv4 header",
            }
            .into());
        }

        let (dont_fragment, more_fragments) = packet.flags();
        let offset = packet.fragment_offset();
        debug!(
            header_len = packet.header_len(),
            identification = packet.identification(),
            dont_fragment,
            more_fragments,
            offset,
            src = %packet.src_addr(),
            dst = %packet.dest_addr(),
            protocol = %packet.protocol(),
            "received IPv4 datagram"
        );
        if offset != 0 {
            return Err(StackError::Fragmented { offset });
        }

        let ip_meta = IpMeta {
            src: packet.src_addr(),
            dst: packet.dest_addr(),
            timestamp: meta.timestamp,
        };
        self.protocols
            .dispatch(packet.protocol(), packet.payload(), &ip_meta);
        Ok(())
    }
}

/// Pads options with End of Options bytes up to a 32 bit boundary.
pub fn pad_options(options: &[u8]) -> Result<Vec<u8>, PacketError> {
    let mut padded = options.to_vec();
    padded.resize((options.len() + 3) & !3, 0);
    let header_len = IPV4_MIN_HEADER_LEN + padded.len();
    if header_len > IPV4_MAX_HEADER_LEN {
        return Err(PacketError::HeaderTooLarge(header_len));
    }
    Ok(padded)
}

/// Payload bytes per fragment on a link of `mtu` bytes.
pub(crate) fn fragment_budget(mtu: usize, header_len: usize) -> Result<usize, PacketError> {
    max_fragment_payload(mtu.min(MAX_LINK_MTU), header_len)
}
