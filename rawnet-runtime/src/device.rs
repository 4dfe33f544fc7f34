use rawnet_packets::MacAddr;
use std::io;
use std::net::Ipv4Addr;

/// A link-layer device that frames are injected into and captured from.
///
/// Both calls take `&self` because the receive thread and every sending thread share one
/// device.
pub trait Device: Send + Sync {
    /// Transmits one complete Ethernet frame.
    fn inject(&self, frame: &[u8]) -> io::Result<()>;

    /// Blocks until a frame is captured, copying it into `buffer` and returning its length.
    /// Returns `Ok(None)` when the device's read timeout elapses with nothing captured, so the
    /// caller can check whether it should keep going.
    fn receive(&self, buffer: &mut [u8]) -> io::Result<Option<usize>>;
}

/// What the stack needs to know about the interface it runs on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Next hop for destinations off our subnet, if the interface has one.
    pub gateway: Option<Ipv4Addr>,
    pub mtu: usize,
}

impl InterfaceInfo {
    /// Whether `ip` shares our subnet and can be reached without the gateway.
    pub fn on_link(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        u32::from(ip) & mask == u32::from(self.ip) & mask
    }
}
