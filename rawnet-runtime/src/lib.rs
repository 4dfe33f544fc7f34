/// The failures a stack operation can surface. Receive-path failures never leave the dispatch
/// closure that hit them: they are logged at debug level and the offending traffic is dropped.
/// Only sends and initialization hand a `StackError` back to the caller.
pub mod error;

/// Time as the stack sees it. Cache lifetimes, receive timestamps and echo send times all come
/// from a `Clock`, so tests can drive them by hand.
pub mod clock;

/// The link-layer device the stack sits on, plus the interface facts (addresses, netmask,
/// gateway, MTU) that the layers need to make routing and framing decisions.
pub mod device;

/// Registries map a small integer key (an Ethertype, an IP protocol number) to the handler that
/// consumes payloads carrying that key. Each layer owns one and registers the layer above it.
pub mod registry;

/// Ethernet framing, destination admission, and demultiplexing by Ethertype.
pub mod ethernet;

/// Address resolution: the IPv4 to MAC cache, answering requests for our own address, and the
/// blocking request/retry exchange that fills the cache.
pub mod arp;

/// IPv4 send (next hop selection, fragmentation) and receive (validation, demultiplexing by
/// protocol number).
pub mod ipv4;

/// ICMP echo: answering pings, sending them, and timing the replies.
pub mod icmp;

/// UDP encapsulation on top of IPv4.
pub mod udp;

/// The receive thread and the worker pool that received frames are processed on.
pub mod runner;

/// Wires every layer together over a device and starts receiving.
pub mod stack;

/// Utility module
pub mod utils;

pub use error::StackError;
pub use stack::{Stack, StackBuilder};
