use crate::arp::{Arp, ArpConfig};
use crate::clock::{Clock, SystemClock};
use crate::device::{Device, InterfaceInfo};
use crate::ethernet::EthernetLayer;
use crate::icmp::Icmp;
use crate::ipv4::{fragment_budget, pad_options, Ipv4Config, Ipv4Layer};
use crate::runner::{FrameReceiver, WorkerPool};
use crate::udp::Udp;
use crate::StackError;
use rawnet_packets::IPV4_MIN_HEADER_LEN;
use std::sync::Arc;
use tracing::info;

/// Configures and starts a `Stack`.
///
/// ```ignore
/// let stack = Stack::builder(device, interface)
///     .workers(4)
///     .ip_options(vec![0x94, 0x04, 0x00, 0x00])
///     .start()?;
/// ```
pub struct StackBuilder {
    device: Arc<dyn Device>,
    interface: InterfaceInfo,
    arp_config: ArpConfig,
    ip_config: Ipv4Config,
    clock: Arc<dyn Clock>,
    workers: usize,
    queue_depth: usize,
    detect_duplicates: bool,
}

impl StackBuilder {
    pub fn new(device: Arc<dyn Device>, interface: InterfaceInfo) -> Self {
        StackBuilder {
            device,
            interface,
            arp_config: ArpConfig::default(),
            ip_config: Ipv4Config::default(),
            clock: Arc::new(SystemClock),
            workers: 8,
            queue_depth: 256,
            detect_duplicates: true,
        }
    }

    pub fn arp_config(mut self, arp_config: ArpConfig) -> Self {
        self.arp_config = arp_config;
        self
    }

    /// Options carried by every outbound datagram, padded to a 32 bit boundary.
    pub fn ip_options(mut self, options: Vec<u8>) -> Self {
        self.ip_config.options = options;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ip_config.ttl = ttl;
        self
    }

    pub fn tos(mut self, tos: u8) -> Self {
        self.ip_config.tos = tos;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Threads that received frames are processed on.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Received frames waiting for a worker before new ones are dropped.
    pub fn queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Whether starting the stack checks that no other host answers ARP for our address.
    pub fn detect_duplicates(mut self, detect_duplicates: bool) -> Self {
        self.detect_duplicates = detect_duplicates;
        self
    }

    /// Starts receiving, then brings the layers up bottom to top. If any layer fails to come
    /// up, receiving stops again and the error is returned.
    pub fn start(self) -> Result<Stack, StackError> {
        let options = pad_options(&self.ip_config.options)?;
        fragment_budget(self.interface.mtu, IPV4_MIN_HEADER_LEN + options.len())?;

        let ethernet = Arc::new(EthernetLayer::new(
            self.device.clone(),
            self.interface.mac,
            self.interface.mtu,
        ));
        let pool = WorkerPool::new(self.workers, self.queue_depth)?;
        let receiver = FrameReceiver::spawn(
            self.device.clone(),
            ethernet.clone(),
            self.clock.clone(),
            pool,
        )?;

        let arp = Arp::initialize(
            ethernet.clone(),
            self.interface.ip,
            self.arp_config,
            self.clock.clone(),
            self.detect_duplicates,
        )?;

        let ip = Ipv4Layer::new(
            ethernet.clone(),
            arp.clone(),
            self.interface.clone(),
            self.ip_config,
        )?;
        ip.attach();

        let icmp = Icmp::new(ip.clone(), self.clock.clone());
        icmp.attach();

        let udp = Udp::new(ip.clone());
        udp.attach();

        info!(
            interface = %self.interface.name,
            ip = %self.interface.ip,
            mac = %self.interface.mac,
            "stack started"
        );
        Ok(Stack {
            interface: self.interface,
            ethernet,
            arp,
            ip,
            icmp,
            udp,
            receiver,
        })
    }
}

/// A running stack. Dropping it stops the receive thread and joins the workers.
pub struct Stack {
    interface: InterfaceInfo,
    ethernet: Arc<EthernetLayer>,
    arp: Arc<Arp>,
    ip: Arc<Ipv4Layer>,
    icmp: Arc<Icmp>,
    udp: Arc<Udp>,
    receiver: FrameReceiver,
}

impl Stack {
    pub fn builder(device: Arc<dyn Device>, interface: InterfaceInfo) -> StackBuilder {
        StackBuilder::new(device, interface)
    }

    pub fn interface(&self) -> &InterfaceInfo {
        &self.interface
    }

    pub fn ethernet(&self) -> &Arc<EthernetLayer> {
        &self.ethernet
    }

    pub fn arp(&self) -> &Arc<Arp> {
        &self.arp
    }

    pub fn ip(&self) -> &Arc<Ipv4Layer> {
        &self.ip
    }

    pub fn icmp(&self) -> &Arc<Icmp> {
        &self.icmp
    }

    pub fn udp(&self) -> &Arc<Udp> {
        &self.udp
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_running()
    }

    pub fn shutdown(mut self) {
        self.receiver.stop();
        info!(interface = %self.interface.name, "stack stopped");
    }
}
