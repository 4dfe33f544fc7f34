//! Queries for the addresses and limits the kernel has configured on an interface.
//!
//! Each query opens a throwaway `AF_INET` datagram socket, since the interface ioctls only need
//! some socket to be issued on.

use crate::linux;
use libc;
use std::{
    io,
    mem::{self, MaybeUninit},
    net::Ipv4Addr,
};

/// The interface's hardware (MAC) address.
pub fn hardware_addr(iface: &str) -> io::Result<[u8; 6]> {
    let ifr = query(iface, linux::SIOCGIFHWADDR)?;
    // The ioctl filled in `ifru_hwaddr`; sa_data holds the address bytes.
    let data = unsafe { ifr.ifr_ifru.ifru_hwaddr.sa_data };
    let mut mac = [0u8; 6];
    for (byte, raw) in mac.iter_mut().zip(data.iter()) {
        *byte = *raw as u8;
    }
    Ok(mac)
}

/// The interface's primary IPv4 address.
pub fn ipv4_addr(iface: &str) -> io::Result<Ipv4Addr> {
    let ifr = query(iface, linux::SIOCGIFADDR)?;
    Ok(sockaddr_ipv4(unsafe { &ifr.ifr_ifru.ifru_addr }))
}

/// The netmask of the interface's primary IPv4 address.
pub fn netmask(iface: &str) -> io::Result<Ipv4Addr> {
    let ifr = query(iface, linux::SIOCGIFNETMASK)?;
    Ok(sockaddr_ipv4(unsafe { &ifr.ifr_ifru.ifru_netmask }))
}

pub fn mtu(iface: &str) -> io::Result<usize> {
    let ifr = query(iface, linux::SIOCGIFMTU)?;
    let mtu = unsafe { ifr.ifr_ifru.ifru_mtu };
    Ok(mtu.max(0) as usize)
}

pub fn index(iface: &str) -> io::Result<libc::c_int> {
    let ifr = query(iface, linux::SIOCGIFINDEX)?;
    Ok(unsafe { ifr.ifr_ifru.ifru_ivalue })
}

/// An `ifreq` naming `iface`, for the ioctls in man 7 netdevice.
pub(crate) fn ifreq_for(iface: &str) -> io::Result<linux::ifreq> {
    let name = iface.as_bytes();
    // One byte is left for the terminating NUL
    if name.is_empty() || name.len() >= libc::IFNAMSIZ || name.contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid interface name {:?}", iface),
        ));
    }

    // An all-zero ifreq is a valid value for every field of the unions it contains.
    let mut ifr: linux::ifreq = unsafe { MaybeUninit::zeroed().assume_init() };
    unsafe {
        for (dst, src) in ifr.ifr_ifrn.ifrn_name.iter_mut().zip(name.iter()) {
            *dst = *src as libc::c_char;
        }
    }
    Ok(ifr)
}

fn query(iface: &str, request: libc::c_ulong) -> io::Result<linux::ifreq> {
    let mut ifr = ifreq_for(iface)?;
    // The socket is only borrowed for the ioctl and closed on every path out of this block.
    // The kernel writes at most size_of::<ifreq>() bytes into `ifr`, which we own.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let err = libc::ioctl(fd, request, &mut ifr as *mut linux::ifreq);
        let result = if err < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        };
        libc::close(fd);
        result?;
    }
    Ok(ifr)
}

fn sockaddr_ipv4(addr: &libc::sockaddr) -> Ipv4Addr {
    // Addresses returned for AF_INET requests are sockaddr_in, which fits inside sockaddr.
    let addr: libc::sockaddr_in = unsafe { mem::transmute_copy(addr) };
    Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr))
}
