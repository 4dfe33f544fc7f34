use crate::device::Device;
use crate::registry::Registry;
use crate::StackError;
use rawnet_packets::{EthernetFrame, MacAddr, PacketData};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// What the Ethernet layer hands up alongside a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkMeta {
    pub src: MacAddr,
    pub timestamp: Duration,
}

/// Frames payloads onto the device and demultiplexes received frames by Ethertype.
pub struct EthernetLayer {
    device: Arc<dyn Device>,
    mac: MacAddr,
    mtu: usize,
    protocols: Registry<u16, LinkMeta>,
}

impl EthernetLayer {
    pub fn new(device: Arc<dyn Device>, mac: MacAddr, mtu: usize) -> Self {
        EthernetLayer {
            device,
            mac,
            mtu,
            protocols: Registry::new("ethertype"),
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn protocols(&self) -> &Registry<u16, LinkMeta> {
        &self.protocols
    }

    /// Builds a frame from us to `dest` and injects it. Nothing is injected if the payload does
    /// not fit in one frame.
    pub fn send(&self, dest: MacAddr, ether_type: u16, payload: &[u8]) -> Result<(), StackError> {
        let frame = EthernetFrame::new(dest, self.mac, ether_type, payload)?;
        trace!(dest = %dest, ether_type, len = frame.len(), "injecting frame");
        self.device.inject(frame.as_ref()).map_err(StackError::Device)
    }

    /// Decodes a captured frame and, if it is addressed to us or to everyone, dispatches its
    /// payload by Ethertype. Returns whether a handler took it.
    pub fn on_frame(&self, data: PacketData, timestamp: Duration) -> Result<bool, StackError> {
        let frame = EthernetFrame::from_buffer(data)?;

        let dest = frame.dest_mac();
        if dest != self.mac && !dest.is_broadcast() {
            trace!(dest = %dest, "frame not addressed to us");
            return Ok(false);
        }

        let meta = LinkMeta {
            src: frame.src_mac(),
            timestamp,
        };
        Ok(self
            .protocols
            .dispatch(frame.ether_type(), frame.payload(), &meta))
    }
}
