#![cfg(target_os = "linux")]
mod interface;
mod linux;
mod sockets;

pub use interface::{hardware_addr, index, ipv4_addr, mtu, netmask};
pub use sockets::{Addr, BoundSocket, PacketType, Socket};
