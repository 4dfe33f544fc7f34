use afpacket::{BoundSocket, PacketType, Socket};
use rawnet_runtime::device::Device;
use std::io;
use std::time::Duration;
use tracing::trace;

/// How long a receive blocks before the receive loop gets to check whether it should stop.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A `Device` backed by an `AF_PACKET` socket bound to one interface.
pub struct AfPacketDevice {
    socket: BoundSocket,
}

impl AfPacketDevice {
    /// Opens a raw socket on `iface`. Needs `CAP_NET_RAW`.
    pub fn open(iface: &str) -> io::Result<AfPacketDevice> {
        let mut socket = Socket::new()?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(AfPacketDevice {
            socket: socket.bind(iface)?,
        })
    }
}

impl Device for AfPacketDevice {
    fn inject(&self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(frame)?;
        if sent < frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }

    fn receive(&self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv(buffer) {
            // Our own transmissions are looped back to every packet socket
            Ok((len, addr)) if addr.packet_type() == PacketType::Outgoing => {
                trace!(len, "skipping outgoing frame");
                Ok(None)
            }
            Ok((len, _)) => Ok(Some(len)),
            Err(ref err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
