#![deny(missing_docs)]

use crate::{interface, linux};
use libc;
use std::{
    io,
    mem::{self, MaybeUninit},
    time::Duration,
};

/// How the kernel classified a captured frame, from `sll_pkttype`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    /// Addressed to this host.
    Host,
    /// Link-layer broadcast.
    Broadcast,
    /// Link-layer multicast.
    Multicast,
    /// Addressed to another host, seen in promiscuous mode.
    OtherHost,
    /// Sent by this host and looped back to packet sockets.
    Outgoing,
    /// Anything the kernel adds later.
    Other(u8),
}

impl From<u8> for PacketType {
    fn from(pkttype: u8) -> Self {
        match pkttype {
            linux::PACKET_HOST => PacketType::Host,
            linux::PACKET_BROADCAST => PacketType::Broadcast,
            linux::PACKET_MULTICAST => PacketType::Multicast,
            linux::PACKET_OTHERHOST => PacketType::OtherHost,
            linux::PACKET_OUTGOING => PacketType::Outgoing,
            other => PacketType::Other(other),
        }
    }
}

/// The link-level address a frame was captured with.
pub struct Addr {
    inner: libc::sockaddr_ll,
}

impl Addr {
    /// How the kernel classified the frame.
    pub fn packet_type(&self) -> PacketType {
        PacketType::from(self.inner.sll_pkttype)
    }
}

/// Represents an unbound `AF_PACKET` socket.  At this phase of a socket's lifecycle, it can be
/// configured.
pub struct Socket {
    fd: libc::c_int,
}

/// Represents a bound `AF_PACKET` socket. At this phase of a socket's lifecycle, it can be read
/// from and written to, from any number of threads at once.
pub struct BoundSocket {
    fd: libc::c_int,
    send_addr: libc::sockaddr_ll,
}

impl Socket {
    /// Creates a new unbound socket that captures every protocol.
    pub fn new() -> io::Result<Self> {
        // FFI only: nothing Rust owns is handed to the kernel, and a failed call is reported as
        // an Err before a Socket exists.
        let fd = unsafe {
            // man 7 packet
            let fd = libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                (libc::ETH_P_ALL as u16).to_be() as libc::c_int,
            );
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            fd
        };
        Ok(Self { fd })
    }

    /// Makes `recv` give up with `WouldBlock` or `TimedOut` once `timeout` passes without a
    /// frame. `None` blocks forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let tv = match timeout {
            Some(timeout) => libc::timeval {
                tv_sec: timeout.as_secs() as libc::time_t,
                tv_usec: timeout.subsec_micros() as libc::suseconds_t,
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        // The kernel copies size_of::<timeval>() bytes out of `tv`, which outlives the call.
        // man 7 socket regarding SO_RCVTIMEO
        let err = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const _ as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if err < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Binds the socket to a network interface. This consumes the `Socket`, as no more
    /// configuration options may be changed.
    pub fn bind(self, iface: &str) -> io::Result<BoundSocket> {
        let ifindex = interface::index(iface)?;

        // `ll` is owned here and only lent to bind(2) for the length we pass.
        let send_addr = unsafe {
            let mut ll: libc::sockaddr_ll = MaybeUninit::zeroed().assume_init();
            ll.sll_family = libc::AF_PACKET as libc::c_ushort;
            ll.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
            ll.sll_ifindex = ifindex;
            // man 7 packet regarding sockaddr_ll
            let err = libc::bind(
                self.fd,
                &ll as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            );
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            ll
        };
        let fd = self.fd;
        // The descriptor now belongs to the BoundSocket, so `self` must not close it.
        mem::forget(self);
        Ok(BoundSocket { fd, send_addr })
    }
}

impl BoundSocket {
    /// Sends a complete frame to the NIC.
    pub fn send(&self, frame: &[u8]) -> io::Result<usize> {
        // The kernel reads at most frame.len() bytes from the borrowed frame.
        let bytes = unsafe {
            libc::sendto(
                self.fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &self.send_addr as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if bytes < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(bytes as usize)
        }
    }

    /// Receives one frame from the NIC, truncated to the length of `frame`.
    pub fn recv(&self, frame: &mut [u8]) -> io::Result<(usize, Addr)> {
        // The kernel writes at most frame.len() bytes into the borrowed buffer and at most
        // `addrlen` bytes into `storage`.
        unsafe {
            let mut storage = MaybeUninit::<libc::sockaddr_ll>::zeroed();
            let mut addrlen = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;

            let bytes = libc::recvfrom(
                self.fd,
                frame.as_mut_ptr() as *mut libc::c_void,
                frame.len(),
                0,
                storage.as_mut_ptr() as *mut libc::sockaddr,
                &mut addrlen,
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok((
                    bytes as usize,
                    Addr {
                        inner: storage.assume_init(),
                    },
                ))
            }
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
