use rawnet_packets::MacAddr;
use rawnet_runtime::device::InterfaceInfo;
use rawnet_runtime::StackError;
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use tracing::debug;

const ROUTE_TABLE: &str = "/proc/net/route";

/// Reads the addresses, MTU and default gateway the kernel has for `iface`.
pub fn interface_info(iface: &str) -> Result<InterfaceInfo, StackError> {
    let mac = afpacket::hardware_addr(iface).map_err(StackError::InterfaceQuery)?;
    let ip = afpacket::ipv4_addr(iface).map_err(StackError::InterfaceQuery)?;
    let netmask = afpacket::netmask(iface).map_err(StackError::InterfaceQuery)?;
    let mtu = afpacket::mtu(iface).map_err(StackError::InterfaceQuery)?;
    let gateway = default_gateway(iface).map_err(StackError::InterfaceQuery)?;

    let info = InterfaceInfo {
        name: iface.to_string(),
        mac: MacAddr::from(mac),
        ip,
        netmask,
        gateway,
        mtu,
    };
    debug!(?info, "queried interface");
    Ok(info)
}

/// The default route's gateway through `iface`, if there is one.
pub fn default_gateway(iface: &str) -> io::Result<Option<Ipv4Addr>> {
    let table = fs::read_to_string(ROUTE_TABLE)?;
    Ok(parse_default_gateway(&table, iface))
}

/// Finds the default route for `iface` in the kernel's route table, whose addresses are
/// printed as hex of their in-memory (network order) bytes read as a host order integer.
fn parse_default_gateway(table: &str, iface: &str) -> Option<Ipv4Addr> {
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [name, destination, gateway, ..] if *name == iface && *destination == "00000000" => {
                let gateway = u32::from_str_radix(gateway, 16).ok()?;
                if gateway == 0 {
                    return None;
                }
                Some(Ipv4Addr::from(gateway.to_le_bytes()))
            }
            _ => None,
        }
    })
}
