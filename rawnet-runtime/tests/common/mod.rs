#![allow(dead_code)]

use crossbeam::channel::Receiver;
use rawnet_packets::*;
use rawnet_runtime::device::InterfaceInfo;
use rawnet_runtime::utils::test::memory_device::{memory_device, MemoryDeviceHandle};
use rawnet_runtime::utils::test::packet_generators::{arp_in, ipv4_in};
use rawnet_runtime::utils::test::peer_host::PeerHost;
use rawnet_runtime::{Stack, StackBuilder, StackError};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

pub const LOCAL_MAC: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const PEER_MAC: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const PEER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// How long the wire must stay quiet before `settle` decides the stack is done sending.
const QUIET: Duration = Duration::from_millis(150);

pub fn interface() -> InterfaceInfo {
    InterfaceInfo {
        name: String::from("mem0"),
        mac: LOCAL_MAC,
        ip: LOCAL_IP,
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        gateway: Some(PEER_IP),
        mtu: 1500,
    }
}

/// Starts a stack at 10.0.0.1 facing a single peer, after `configure` has had its say. The
/// duplicate address check is off unless `configure` turns it back on.
pub fn start_with<F>(
    peer: fn(MemoryDeviceHandle, MacAddr, Ipv4Addr) -> PeerHost,
    peer_ip: Ipv4Addr,
    configure: F,
) -> (Result<Stack, StackError>, PeerHost)
where
    F: FnOnce(StackBuilder) -> StackBuilder,
{
    let (device, handle) = memory_device();
    let peer = peer(handle, PEER_MAC, peer_ip);
    let builder = Stack::builder(Arc::new(device), interface())
        .workers(4)
        .detect_duplicates(false);
    (configure(builder).start(), peer)
}

pub fn start<F>(configure: F) -> (Stack, PeerHost)
where
    F: FnOnce(StackBuilder) -> StackBuilder,
{
    let (stack, peer) = start_with(PeerHost::spawn, PEER_IP, configure);
    (stack.unwrap(), peer)
}

/// Every frame the stack sends until the wire goes quiet.
pub fn settle(seen: &Receiver<PacketData>) -> Vec<PacketData> {
    let mut frames = vec![];
    while let Ok(frame) = seen.recv_timeout(QUIET) {
        frames.push(frame);
    }
    frames
}

pub fn arp_requests(frames: &[PacketData]) -> Vec<ArpPacket> {
    frames
        .iter()
        .filter_map(|frame| arp_in(frame))
        .filter(|arp| arp.opcode() == ArpOp::Request as u16)
        .collect()
}

pub fn datagrams(frames: &[PacketData]) -> Vec<Ipv4Packet> {
    frames.iter().filter_map(|frame| ipv4_in(frame)).collect()
}

pub fn dest_mac(frame: &[u8]) -> MacAddr {
    EthernetFrame::from_buffer(frame.to_vec()).unwrap().dest_mac()
}
