//! This crate runs a rawnet stack on a real interface through the `afpacket` crate.
#![cfg(target_os = "linux")]
#![deny(missing_docs)]

mod device;
mod interface;

pub use device::AfPacketDevice;
pub use interface::{default_gateway, interface_info};
