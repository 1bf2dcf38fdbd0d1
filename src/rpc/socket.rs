//! UDP socket layer encoding outgoing packets and decoding incoming ones.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::trace;

use crate::common::Packet;
use crate::error::EncodeError;

use super::config::Config;

/// Largest datagram this socket sends or accepts.
pub const MTU: usize = 2048;
/// The maximum duration to backoff checking the [UdpSocket] buffer after it is empty.
/// Lower values increases CPU usage, but reduces latency, and drains the buffer faster,
/// reducing the risk of packet loss.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(10);

/// A UdpSocket wrapper that speaks [Packet]s.
#[derive(Debug)]
pub struct PacketSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl PacketSocket {
    pub(crate) fn new(config: &Config) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(SocketAddr::new(config.bind_ip, config.port.unwrap_or(0)))?;
        let local_addr = socket.local_addr()?;

        socket.set_nonblocking(true)?;

        Ok(Self { socket, local_addr })
    }

    // === Getters ===

    /// Returns the address the socket is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // === Public Methods ===

    /// Serialize a packet, refusing anything that wouldn't fit in one datagram.
    pub fn encode(packet: &Packet) -> Result<Vec<u8>, EncodeError> {
        let bytes = packet.to_bytes()?;

        if bytes.len() > MTU {
            return Err(EncodeError::TooLarge(bytes.len()));
        }

        Ok(bytes)
    }

    /// Write already encoded bytes to `address`.
    pub fn send_bytes(&self, address: SocketAddr, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.socket.send_to(bytes, address)?;
        trace!(context = "socket_message_sending", ?address, len = bytes.len());

        Ok(())
    }

    /// Receives a single packet on the socket.
    /// On success, returns the packet and its origin.
    pub fn recv_from(&self) -> Option<(Packet, SocketAddr)> {
        let mut buf = [0u8; MTU];

        match self.socket.recv_from(&mut buf) {
            Ok((amt, from)) => {
                let bytes = &buf[..amt];

                if from.port() == 0 {
                    trace!(
                        context = "socket_validation",
                        message = "Packet from port 0"
                    );
                    return None;
                }

                match Packet::from_bytes(bytes) {
                    Ok(packet) => {
                        trace!(
                            context = "socket_message_receiving",
                            ?packet,
                            ?from,
                            "Received packet"
                        );
                        return Some((packet, from));
                    }
                    Err(error) => {
                        trace!(
                            context = "socket_error",
                            ?error,
                            ?from,
                            message = ?String::from_utf8_lossy(bytes),
                            "Received invalid packet"
                        );
                    }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(MAX_THREAD_BLOCK_DURATION);
            }
            Err(e) => {
                trace!(
                    context = "socket_error",
                    ?e,
                    "recv_from failed unexpectedly"
                );
            }
        }

        None
    }
}

/// Same as SocketAddr::eq but ignores the ip if it is unspecified for testing reasons.
pub(crate) fn compare_socket_addr(a: &SocketAddr, b: &SocketAddr) -> bool {
    if a.port() != b.port() {
        return false;
    }

    if a.ip().is_unspecified() {
        return true;
    }

    a.ip() == b.ip()
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread;

    use bytes::Bytes;

    use crate::common::{Contact, Id, Payload};

    use super::*;

    fn local() -> PacketSocket {
        PacketSocket::new(&Config {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn recv_packet() {
        let server = local();
        let server_address = server.local_addr();

        let client = local();
        let client_address = client.local_addr();

        let packet = Packet::new(Contact::new(Id::random(), client_address), None, Payload::Ping);
        let expected = packet.clone();

        let server_thread = thread::spawn(move || loop {
            if let Some((packet, from)) = server.recv_from() {
                assert_eq!(from, client_address);
                assert_eq!(packet, expected);
                break;
            }
        });

        let bytes = PacketSocket::encode(&packet).unwrap();
        client.send_bytes(server_address, &bytes).unwrap();

        server_thread.join().unwrap();
    }

    #[test]
    fn encode_too_large() {
        let packet = Packet::new(
            Contact::new(Id::random(), "127.0.0.1:1".parse().unwrap()),
            None,
            Payload::Custom(Bytes::from(vec![0u8; MTU])),
        );

        assert!(matches!(
            PacketSocket::encode(&packet),
            Err(EncodeError::TooLarge(_))
        ));
    }

    #[test]
    fn ignore_garbage() {
        let server = local();
        let server_address = server.local_addr();

        let client = local();
        client.send_bytes(server_address, b"not a packet").unwrap();

        thread::sleep(Duration::from_millis(20));

        assert!(server.recv_from().is_none());
    }

    #[test]
    fn compare_addresses() {
        let a: SocketAddr = "0.0.0.0:1000".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:1000".parse().unwrap();
        let c: SocketAddr = "127.0.0.1:1001".parse().unwrap();

        assert!(compare_socket_addr(&a, &b));
        assert!(compare_socket_addr(&b, &b));
        assert!(!compare_socket_addr(&b, &c));
        assert!(!compare_socket_addr(&b, &a));
    }
}
