use crate::clock::Clock;
use crate::ipv4::{IpMeta, Ipv4Layer};
use crate::StackError;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use rawnet_packets::*;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace};

/// How long an echo request waits for its reply before it is forgotten.
pub const ECHO_TTL: Duration = Duration::from_secs(10);
/// Most echo requests remembered at once.
pub const ECHO_CAPACITY: usize = 1024;
const REPORT_QUEUE_DEPTH: usize = 64;

/// A matched echo reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EchoRtt {
    pub from: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
    pub rtt: Duration,
}

type EchoKey = (Ipv4Addr, u16, u16);

/// Send times of echo requests still waiting for a reply, keyed by (destination, identifier,
/// sequence).
struct EchoTable {
    sent: HashMap<EchoKey, Duration>,
}

impl EchoTable {
    fn new() -> Self {
        EchoTable {
            sent: HashMap::new(),
        }
    }

    fn insert(&mut self, key: EchoKey, now: Duration) {
        self.prune(now);
        if !self.sent.contains_key(&key) && self.sent.len() >= ECHO_CAPACITY {
            let oldest = self
                .sent
                .iter()
                .min_by_key(|(_, sent)| **sent)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                self.sent.remove(&oldest);
            }
        }
        self.sent.insert(key, now);
    }

    fn take(&mut self, key: &EchoKey, now: Duration) -> Option<Duration> {
        self.prune(now);
        self.sent.remove(key)
    }

    fn prune(&mut self, now: Duration) {
        self.sent.retain(|_, sent| now < *sent + ECHO_TTL);
    }
}

/// ICMP echo on top of IPv4: answers echo requests, sends them, and reports round trip times
/// for the replies that match.
pub struct Icmp {
    ip: Arc<Ipv4Layer>,
    clock: Arc<dyn Clock>,
    echoes: Mutex<EchoTable>,
    reports: Sender<EchoRtt>,
    report_receiver: Receiver<EchoRtt>,
}

impl Icmp {
    pub fn new(ip: Arc<Ipv4Layer>, clock: Arc<dyn Clock>) -> Arc<Icmp> {
        let (reports, report_receiver) = channel::bounded(REPORT_QUEUE_DEPTH);
        Arc::new(Icmp {
            ip,
            clock,
            echoes: Mutex::new(EchoTable::new()),
            reports,
            report_receiver,
        })
    }

    /// Registers this layer's receive handler for IP protocol 1.
    pub fn attach(self: &Arc<Self>) {
        let icmp = Arc::downgrade(self);
        self.ip
            .protocols()
            .register(IpProtocol::ICMP, move |payload: &[u8], meta: &IpMeta| {
                if let Some(icmp) = icmp.upgrade() {
                    if let Err(err) = icmp.on_message(payload, meta) {
                        debug!(error = %err, src = %meta.src, "dropping ICMP message");
                    }
                }
            });
    }

    /// Round trip times of matched echo replies, in the order they were received.
    pub fn rtt_reports(&self) -> Receiver<EchoRtt> {
        self.report_receiver.clone()
    }

    /// Sends an echo request to `dst`.
    pub fn ping(
        &self,
        dst: Ipv4Addr,
        identifier: u16,
        sequence: u16,
        data: &[u8],
    ) -> Result<(), StackError> {
        self.send_echo(data, ICMP_ECHO_REQUEST, 0, identifier, sequence, dst)
    }

    /// Builds and sends an echo message. Only echo requests and echo replies can be sent.
    ///
    /// A request's send time is recorded before it goes out, so a reply can never arrive
    /// ahead of it.
    pub fn send_echo(
        &self,
        data: &[u8],
        msg_type: u8,
        code: u8,
        identifier: u16,
        sequence: u16,
        dst: Ipv4Addr,
    ) -> Result<(), StackError> {
        if msg_type != ICMP_ECHO_REQUEST && msg_type != ICMP_ECHO_REPLY {
            return Err(StackError::UnsupportedIcmpType(msg_type));
        }

        let message = IcmpEcho {
            msg_type,
            code,
            identifier,
            sequence,
            data: data.to_vec(),
        };
        let key = (dst, identifier, sequence);
        if message.is_request() {
            let now = self.clock.now();
            self.lock_echoes().insert(key, now);
        }

        let sent = self.ip.send(dst, &message.emit(), IpProtocol::ICMP);
        if sent.is_err() && message.is_request() {
            let now = self.clock.now();
            self.lock_echoes().take(&key, now);
        }
        sent
    }

    /// Handles an ICMP message from `meta.src`: echo requests are answered, echo replies are
    /// matched against outstanding requests, anything else is ignored.
    pub fn on_message(&self, payload: &[u8], meta: &IpMeta) -> Result<(), StackError> {
        let message = IcmpEcho::try_from(payload)?;
        debug!(
            src = %meta.src,
            msg_type = message.msg_type,
            code = message.code,
            "received ICMP message"
        );

        match message.msg_type {
            ICMP_ECHO_REQUEST => {
                let reply = message.reply();
                self.send_echo(
                    &reply.data,
                    reply.msg_type,
                    reply.code,
                    reply.identifier,
                    reply.sequence,
                    meta.src,
                )
            }
            ICMP_ECHO_REPLY => {
                let key = (meta.src, message.identifier, message.sequence);
                let sent = self.lock_echoes().take(&key, meta.timestamp);
                match sent {
                    Some(sent) => {
                        self.report(EchoRtt {
                            from: meta.src,
                            identifier: message.identifier,
                            sequence: message.sequence,
                            rtt: meta.timestamp.checked_sub(sent).unwrap_or_default(),
                        });
                    }
                    None => {
                        trace!(
                            src = %meta.src,
                            identifier = message.identifier,
                            sequence = message.sequence,
                            "echo reply matches no request"
                        );
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn report(&self, rtt: EchoRtt) {
        info!(
            from = %rtt.from,
            identifier = rtt.identifier,
            sequence = rtt.sequence,
            rtt_ms = rtt.rtt.as_secs_f64() * 1000.0,
            "echo reply"
        );
        if let Err(TrySendError::Full(rtt)) = self.reports.try_send(rtt) {
            debug!(from = %rtt.from, "RTT report queue full, dropping report");
        }
    }

    fn lock_echoes(&self) -> MutexGuard<'_, EchoTable> {
        self.echoes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
