use rawnet_packets::MacAddr;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::time::Duration;

struct Entry {
    mac: MacAddr,
    inserted: Duration,
    seq: u64,
}

/// IPv4 to MAC translations that expire a fixed time after insertion.
///
/// Expiry is read-through: an expired entry is removed the first time it is looked at and
/// otherwise behaves as absent. When the table is full, inserting a new address evicts the
/// entry that was inserted longest ago.
pub(crate) struct ArpCache {
    entries: HashMap<Ipv4Addr, Entry>,
    /// Insertion order. Holds stale positions for re-inserted or removed addresses; those are
    /// recognised by their sequence number and skipped.
    order: VecDeque<(Ipv4Addr, u64)>,
    next_seq: u64,
    ttl: Duration,
    capacity: usize,
}

impl ArpCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        ArpCache {
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&mut self, ip: Ipv4Addr, now: Duration) -> Option<MacAddr> {
        let expired = match self.entries.get(&ip) {
            Some(entry) => self.is_expired(entry, now),
            None => return None,
        };
        if expired {
            self.entries.remove(&ip);
            return None;
        }
        self.entries.get(&ip).map(|entry| entry.mac)
    }

    /// Inserts or refreshes a translation. A refresh restarts the entry's lifetime and moves it
    /// to the back of the eviction order.
    pub fn insert(&mut self, ip: Ipv4Addr, mac: MacAddr, now: Duration) {
        if !self.entries.contains_key(&ip) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            ip,
            Entry {
                mac,
                inserted: now,
                seq,
            },
        );
        self.order.push_back((ip, seq));

        if self.order.len() > self.capacity * 2 {
            self.compact_order();
        }
    }

    /// Every live translation, ordered by address.
    pub fn entries(&mut self, now: Duration) -> Vec<(Ipv4Addr, MacAddr)> {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now < entry.inserted + ttl);

        let mut live: Vec<(Ipv4Addr, MacAddr)> = self
            .entries
            .iter()
            .map(|(ip, entry)| (*ip, entry.mac))
            .collect();
        live.sort();
        live
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_expired(&self, entry: &Entry, now: Duration) -> bool {
        now >= entry.inserted + self.ttl
    }

    fn evict_oldest(&mut self) {
        while let Some((ip, seq)) = self.order.pop_front() {
            let current = self.entries.get(&ip).map(|entry| entry.seq);
            if current == Some(seq) {
                self.entries.remove(&ip);
                return;
            }
        }
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(ip, seq)| entries.get(ip).map(|entry| entry.seq) == Some(*seq));
    }
}
