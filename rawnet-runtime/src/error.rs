use rawnet_packets::{MacAddr, PacketError};
use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    /// A frame, header or message could not be decoded or built.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// The sender hardware address inside an ARP message disagrees with the Ethernet source.
    #[error("ARP sender {arp} does not match Ethernet source {ethernet}")]
    AddressMismatch { ethernet: MacAddr, arp: MacAddr },

    /// An ARP reply that no resolution is waiting for.
    #[error("unsolicited ARP reply from {0}")]
    UnsolicitedReply(Ipv4Addr),

    #[error("ARP message targets {0}, not this host")]
    NotForUs(Ipv4Addr),

    /// No hardware address could be found for the next hop.
    #[error("could not resolve a hardware address for {0}")]
    ResolutionFailed(Ipv4Addr),

    /// Another host answered for our own address while the ARP layer was starting.
    #[error("{0} is already in use by {1}")]
    DuplicateAddress(Ipv4Addr, MacAddr),

    #[error("interface query failed: {0}")]
    InterfaceQuery(#[source] io::Error),

    #[error("device error: {0}")]
    Device(#[source] io::Error),

    #[error("ICMP type {0} cannot be sent, only echo request (8) and echo reply (0)")]
    UnsupportedIcmpType(u8),

    /// Non-initial fragments are dropped; there is no reassembly.
    #[error("dropped IPv4 fragment at offset {offset}")]
    Fragmented { offset: u16 },
}
