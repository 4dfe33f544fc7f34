//! Wire formats for the rawnet stack: Ethernet II, ARP for IPv4 over Ethernet, IPv4, ICMP echo
//! and UDP. Everything here is pure byte manipulation; sending, receiving and state live in
//! `rawnet-runtime`.

mod types;
pub use self::types::*;

mod error;
pub use self::error::*;

mod checksum;
pub use self::checksum::*;

mod ethernet;
pub use self::ethernet::*;

mod arp;
pub use self::arp::*;

mod ipv4;
pub use self::ipv4::*;

mod icmp;
pub use self::icmp::*;

mod udp;
pub use self::udp::*;
