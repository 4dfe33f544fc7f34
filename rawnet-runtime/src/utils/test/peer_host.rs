use crate::utils::test::memory_device::MemoryDeviceHandle;
use crate::utils::test::packet_generators::*;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use rawnet_packets::*;
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A simulated host on the far side of a `MemoryDevice`.
///
/// It watches every frame the stack injects, answers ARP requests for its own address and
/// (unless told not to) ICMP echo requests sent to it, and forwards a copy of each frame to
/// `seen` so tests can still inspect the stack's traffic. Tests put their own frames on the
/// wire through `inbound`.
pub struct PeerHost {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub seen: Receiver<PacketData>,
    pub inbound: Sender<PacketData>,
    stopped: Arc<AtomicCell<bool>>,
    thread: Option<JoinHandle<()>>,
}

impl PeerHost {
    pub fn spawn(handle: MemoryDeviceHandle, mac: MacAddr, ip: Ipv4Addr) -> PeerHost {
        PeerHost::spawn_with(handle, mac, ip, true)
    }

    /// A peer that answers ARP but leaves echo requests alone, so tests can send the replies.
    pub fn arp_only(handle: MemoryDeviceHandle, mac: MacAddr, ip: Ipv4Addr) -> PeerHost {
        PeerHost::spawn_with(handle, mac, ip, false)
    }

    fn spawn_with(
        handle: MemoryDeviceHandle,
        mac: MacAddr,
        ip: Ipv4Addr,
        answers_echo: bool,
    ) -> PeerHost {
        let (seen_sender, seen) = channel::unbounded();
        let inbound = handle.inbound.clone();
        let stopped = Arc::new(AtomicCell::new(false));
        let stop = stopped.clone();

        let thread = thread::spawn(move || {
            while !stop.load() {
                let frame = match handle.injected.recv_timeout(Duration::from_millis(10)) {
                    Ok(frame) => frame,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };

                if let Some(answer) = answer(&frame, mac, ip, answers_echo) {
                    let _ = handle.inbound.send(answer);
                }
                let _ = seen_sender.send(frame);
            }
        });

        PeerHost {
            mac,
            ip,
            seen,
            inbound,
            stopped,
            thread: Some(thread),
        }
    }
}

fn answer(frame: &[u8], mac: MacAddr, ip: Ipv4Addr, answers_echo: bool) -> Option<PacketData> {
    if let Some(arp) = arp_in(frame) {
        if arp.opcode() == ArpOp::Request as u16 && arp.target_protocol_addr() == ip {
            return Some(arp_reply_frame(
                mac,
                ip,
                arp.sender_hardware_addr(),
                arp.sender_protocol_addr(),
            ));
        }
        return None;
    }

    if !answers_echo {
        return None;
    }
    let datagram = ipv4_in(frame)?;
    if datagram.dest_addr() != ip || datagram.protocol() != IpProtocol::ICMP {
        return None;
    }
    let echo = IcmpEcho::try_from(datagram.payload()).ok()?;
    if !echo.is_request() {
        return None;
    }
    let src_mac = EthernetFrame::from_buffer(frame.to_vec()).ok()?.src_mac();
    Some(icmp_echo_frame(
        (mac, ip),
        (src_mac, datagram.src_addr()),
        &echo.reply(),
    ))
}

impl Drop for PeerHost {
    fn drop(&mut self) {
        self.stopped.store(true);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
