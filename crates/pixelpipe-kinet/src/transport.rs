//! Blocking UDP link used on the frame path

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use tracing::{debug, trace};

use crate::error::Result;

/// Fire-and-forget UDP sender for one supply
///
/// The socket is bound on first send and dropped after any send error, so
/// the next send starts with a fresh socket.
#[derive(Debug)]
pub struct UdpLink {
    target: SocketAddr,
    socket: Option<UdpSocket>,
}

impl UdpLink {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            target: SocketAddr::V4(SocketAddrV4::new(ip, port)),
            socket: None,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn socket(&mut self) -> Result<&UdpSocket> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                let socket = UdpSocket::bind("0.0.0.0:0")?;
                debug!(target = %self.target, local = ?socket.local_addr().ok(), "Opened UDP link");
                socket
            }
        };
        Ok(self.socket.insert(socket))
    }

    /// Send one datagram
    pub fn send(&mut self, packet: &[u8]) -> Result<()> {
        let target = self.target;
        let result = self
            .socket()
            .and_then(|socket| socket.send_to(packet, target).map_err(Into::into));
        match result {
            Ok(sent) => {
                trace!(target = %target, bytes = sent, "Sent datagram");
                Ok(())
            }
            Err(e) => {
                self.socket = None;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lazy_open_and_send() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut link = UdpLink::new(Ipv4Addr::LOCALHOST, port);
        assert!(!link.is_open());
        link.send(b"hello").unwrap();
        assert!(link.is_open());

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
    }

    #[test]
    fn test_reopen_after_send_error() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut link = UdpLink::new(Ipv4Addr::LOCALHOST, port);
        // Larger than any UDP datagram, so the kernel refuses it
        let oversized = vec![0u8; 70_000];
        assert!(link.send(&oversized).is_err());
        assert!(!link.is_open());

        link.send(b"again").unwrap();
        assert!(link.is_open());
        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"again");
    }
}
