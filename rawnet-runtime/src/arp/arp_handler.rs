use super::Arp;
use crate::StackError;
use rawnet_packets::{ArpPacket, MacAddr, ARP_ETHER_TYPE};
use tracing::{debug, info, trace};

impl Arp {
    ///
    /// Answers a who-has for our own address with a unicast reply to the requester.
    /// Drops
    /// - requests whose ARP sender differs from the Ethernet source
    /// - requests for any address other than ours
    /// - our own requests coming back to us
    /// Requests never teach the cache anything.
    ///
    pub(super) fn handle_request(
        &self,
        request: &ArpPacket,
        src: MacAddr,
    ) -> Result<(), StackError> {
        let sender_mac = self.check_sender(request, src)?;
        if request.target_protocol_addr() != self.ip {
            return Err(StackError::NotForUs(request.target_protocol_addr()));
        }
        if sender_mac == self.mac() {
            trace!("ignoring our own ARP request");
            return Ok(());
        }

        let sender_ip = request.sender_protocol_addr();
        let reply = ArpPacket::reply(self.mac(), self.ip, sender_mac, sender_ip);
        self.ethernet
            .send(sender_mac, ARP_ETHER_TYPE, reply.as_bytes())?;
        debug!(ip = %sender_ip, mac = %sender_mac, "answered ARP request");
        Ok(())
    }

    ///
    /// Settles the pending resolution if this reply is the one it waits for.
    /// Drops
    /// - replies whose ARP sender differs from the Ethernet source
    /// - replies addressed to another host
    /// - replies from an address nobody is resolving right now
    /// Replies sent from our own MAC are ignored, so our own echo never looks like another
    /// host claiming our address.
    ///
    pub(super) fn handle_reply(&self, reply: &ArpPacket, src: MacAddr) -> Result<(), StackError> {
        let sender_mac = self.check_sender(reply, src)?;
        if reply.target_protocol_addr() != self.ip {
            return Err(StackError::NotForUs(reply.target_protocol_addr()));
        }
        if sender_mac == self.mac() {
            trace!("ignoring our own ARP reply");
            return Ok(());
        }

        let sender_ip = reply.sender_protocol_addr();
        {
            let mut slot = self.lock_pending();
            if slot.target != Some(sender_ip) || !slot.awaiting {
                return Err(StackError::UnsolicitedReply(sender_ip));
            }
            let now = self.clock.now();
            self.lock_cache().insert(sender_ip, sender_mac, now);
            slot.awaiting = false;
            slot.resolved = Some(sender_mac);
        }
        self.answered.notify_all();

        info!(ip = %sender_ip, mac = %sender_mac, "resolved");
        Ok(())
    }

    fn check_sender(&self, arp: &ArpPacket, src: MacAddr) -> Result<MacAddr, StackError> {
        let sender_mac = arp.sender_hardware_addr();
        if sender_mac != src {
            return Err(StackError::AddressMismatch {
                ethernet: src,
                arp: sender_mac,
            });
        }
        Ok(sender_mac)
    }
}
