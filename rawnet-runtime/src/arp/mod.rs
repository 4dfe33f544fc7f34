/// ARP for IPv4 over Ethernet, RFC 826
/// https://tools.ietf.org/html/rfc826
///
/// `Arp` answers requests for our own address and resolves other addresses on demand. Only one
/// resolution is in flight at a time: a caller that misses the cache takes the single pending
/// slot, broadcasts a request, and waits on a condition variable for the receive path to
/// deliver a matching reply. Callers resolving anything else while the slot is taken wait for
/// it to be vacated, so resolutions of unrelated addresses serialize.
///
/// Lock order: `pending` may be held while `cache` is taken, never the reverse.
mod arp_table;
pub(crate) use self::arp_table::ArpCache;

mod arp_handler;

use crate::clock::Clock;
use crate::ethernet::{EthernetLayer, LinkMeta};
use crate::StackError;
use rawnet_packets::{ArpOp, ArpPacket, MacAddr, PacketError, ARP_ETHER_TYPE};
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const REQUEST: u16 = ArpOp::Request as u16;
const REPLY: u16 = ArpOp::Reply as u16;

/// Tunables for address resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpConfig {
    /// Requests sent before giving up on an address.
    pub attempts: usize,
    /// How long each request waits for its reply.
    pub reply_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for ArpConfig {
    fn default() -> Self {
        ArpConfig {
            attempts: 3,
            reply_timeout: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(10),
            cache_capacity: 100,
        }
    }
}

impl ArpConfig {
    pub fn new() -> Self {
        ArpConfig::default()
    }

    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}

/// The single in-flight resolution. All three fields change together under one lock.
#[derive(Debug, Default)]
struct Pending {
    target: Option<Ipv4Addr>,
    awaiting: bool,
    resolved: Option<MacAddr>,
}

pub struct Arp {
    ethernet: Arc<EthernetLayer>,
    ip: Ipv4Addr,
    config: ArpConfig,
    clock: Arc<dyn Clock>,
    cache: Mutex<ArpCache>,
    pending: Mutex<Pending>,
    /// Signalled when a reply settles the pending resolution.
    answered: Condvar,
    /// Signalled when the pending slot is released.
    vacated: Condvar,
}

impl Arp {
    /// Builds the ARP layer without attaching it to the Ethernet layer.
    pub fn new(
        ethernet: Arc<EthernetLayer>,
        ip: Ipv4Addr,
        config: ArpConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Arp> {
        let cache = ArpCache::new(config.cache_ttl, config.cache_capacity);
        Arc::new(Arp {
            ethernet,
            ip,
            config,
            clock,
            cache: Mutex::new(cache),
            pending: Mutex::new(Pending::default()),
            answered: Condvar::new(),
            vacated: Condvar::new(),
        })
    }

    /// Builds the ARP layer, registers it for Ethertype 0x0806, and, when `detect_duplicates`
    /// is set, resolves our own address to find out whether another host already uses it.
    ///
    /// The receive path must already be running for that check to see any answer.
    pub fn initialize(
        ethernet: Arc<EthernetLayer>,
        ip: Ipv4Addr,
        config: ArpConfig,
        clock: Arc<dyn Clock>,
        detect_duplicates: bool,
    ) -> Result<Arc<Arp>, StackError> {
        let arp = Arp::new(ethernet, ip, config, clock);
        arp.attach();

        if detect_duplicates {
            if let Some(mac) = arp.resolve(ip)? {
                return Err(StackError::DuplicateAddress(ip, mac));
            }
            debug!(ip = %ip, "no other host answers for our address");
        }

        info!(ip = %ip, mac = %arp.mac(), "ARP layer ready");
        Ok(arp)
    }

    /// Registers this layer's receive handler with the Ethernet layer.
    pub fn attach(self: &Arc<Self>) {
        let arp = Arc::downgrade(self);
        self.ethernet
            .protocols()
            .register(ARP_ETHER_TYPE, move |payload: &[u8], meta: &LinkMeta| {
                if let Some(arp) = arp.upgrade() {
                    if let Err(err) = arp.on_frame(payload, meta) {
                        debug!(error = %err, src = %meta.src, "dropping ARP frame");
                    }
                }
            });
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn mac(&self) -> MacAddr {
        self.ethernet.mac()
    }

    /// Finds the hardware address for `ip`, asking the network on a cache miss.
    ///
    /// Returns `Ok(None)` when every attempt times out. Errors only come from the device.
    pub fn resolve(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>, StackError> {
        if let Some(mac) = self.cached(ip) {
            return Ok(Some(mac));
        }

        let mut slot = self.lock_pending();
        while slot.target.is_some() {
            slot = self
                .vacated
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        // Whoever held the slot may have resolved this address for us
        if let Some(mac) = self.cached(ip) {
            return Ok(Some(mac));
        }

        *slot = Pending {
            target: Some(ip),
            awaiting: true,
            resolved: None,
        };

        let request = ArpPacket::request(self.mac(), self.ip, ip);
        let mut outcome = Ok(None);
        for attempt in 1..=self.config.attempts {
            debug!(ip = %ip, attempt, "broadcasting ARP request");
            if let Err(err) = self
                .ethernet
                .send(MacAddr::BROADCAST, ARP_ETHER_TYPE, request.as_bytes())
            {
                outcome = Err(err);
                break;
            }

            let deadline = Instant::now() + self.config.reply_timeout;
            let mut remaining = self.config.reply_timeout;
            while slot.awaiting && remaining > Duration::from_secs(0) {
                slot = self
                    .answered
                    .wait_timeout(slot, remaining)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                remaining = deadline.saturating_duration_since(Instant::now());
            }

            if !slot.awaiting {
                outcome = Ok(slot.resolved);
                break;
            }
        }

        *slot = Pending::default();
        drop(slot);
        self.vacated.notify_all();

        if let Ok(None) = outcome {
            debug!(ip = %ip, attempts = self.config.attempts, "ARP resolution timed out");
        }
        outcome
    }

    /// Every live cache entry, ordered by address.
    pub fn cache_entries(&self) -> Vec<(Ipv4Addr, MacAddr)> {
        let now = self.clock.now();
        self.lock_cache().entries(now)
    }

    /// Handles an ARP message received from `meta.src`.
    pub fn on_frame(&self, payload: &[u8], meta: &LinkMeta) -> Result<(), StackError> {
        let arp = ArpPacket::try_from(payload)?;
        match arp.opcode() {
            REQUEST => self.handle_request(&arp, meta.src),
            REPLY => self.handle_reply(&arp, meta.src),
            _ => Err(StackError::Packet(PacketError::Decode {
                layer: "ARP message",
                reason: "opcode is neither request nor reply",
            })),
        }
    }

    fn cached(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        let now = self.clock.now();
        self.lock_cache().get(ip, now)
    }

    fn lock_cache(&self) -> MutexGuard<'_, ArpCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
