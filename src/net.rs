//! Socket construction
//!
//! All sockets in the engine are built here so kernel buffer sizing and
//! listener options live in one place. Video datagrams approach 120 KiB,
//! well past default buffer sizes on most distributions.

use std::io;
use std::net::{SocketAddr, TcpListener, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

/// Bind a UDP socket on all interfaces with enlarged kernel buffers.
pub fn bind_udp(port: u16, buffer_bytes: usize) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_recv_buffer_size(buffer_bytes)?;
    socket.set_send_buffer_size(buffer_bytes)?;
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// UDP socket on an ephemeral port, used only for sending.
pub fn udp_sender(buffer_bytes: usize) -> io::Result<UdpSocket> {
    bind_udp(0, buffer_bytes)
}

/// Non-blocking TCP listener for the control channel. Non-blocking so the
/// accept loop can poll its shutdown flag between attempts.
pub fn control_listener(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    socket.bind(&addr.into())?;
    socket.listen(1)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// True for the error kinds a read/accept timeout surfaces as.
pub fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
