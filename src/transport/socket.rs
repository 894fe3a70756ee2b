//! [`Transmit`] adapters.
//!
//! [`UdpTransmitter`] sends to a fixed peer over a tokio UDP socket;
//! [`ChannelTransmitter`] hands datagrams to an in-process channel, for
//! links that are driven by another task (or by tests).

#[cfg(feature = "udp")]
use std::io;
#[cfg(feature = "udp")]
use std::net::SocketAddr;
#[cfg(feature = "udp")]
use std::sync::Arc;

#[cfg(feature = "udp")]
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::core::{Transmit, TransportError, TransportResult};

/// Non-blocking UDP sender bound to one peer.
///
/// The socket is shared: the receive side of the connection can keep
/// reading from [`socket_arc`](Self::socket_arc) and feed acknowledgements
/// back to the scheduler.
#[cfg(feature = "udp")]
#[cfg_attr(docsrs, doc(cfg(feature = "udp")))]
#[derive(Debug, Clone)]
pub struct UdpTransmitter {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

#[cfg(feature = "udp")]
impl UdpTransmitter {
    /// Bind a new socket and target `peer`.
    ///
    /// Waits until the socket reports writable, so the first transmission
    /// is not refused as would-block.
    pub async fn bind(local: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.writable().await?;
        Ok(Self::new(Arc::new(socket), peer))
    }

    /// Wrap an existing socket.
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }

    /// Peer every datagram is sent to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Get a clone of the Arc-wrapped socket.
    pub fn socket_arc(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

#[cfg(feature = "udp")]
impl Transmit for UdpTransmitter {
    fn transmit(&self, datagram: &[u8]) -> TransportResult<()> {
        match self.socket.try_send_to(datagram, self.peer) {
            Ok(sent) if sent == datagram.len() => Ok(()),
            Ok(sent) => Err(TransportError::Truncated {
                sent,
                len: datagram.len(),
            }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::WouldBlock),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// Sends datagrams into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransmitter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransmitter {
    /// Create a transmitter and the receiver that sees its datagrams.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender.
    pub fn from_sender(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl Transmit for ChannelTransmitter {
    fn transmit(&self, datagram: &[u8]) -> TransportResult<()> {
        self.tx
            .send(datagram.to_vec())
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::ExchangeId;
    use crate::transport::{Outcome, RetransmissionScheduler, TransmissionParams};

    #[test]
    fn test_channel_transmitter() {
        let (transmitter, mut rx) = ChannelTransmitter::new();
        transmitter.transmit(b"hello").unwrap();
        assert_eq!(rx.try_recv().unwrap(), b"hello".to_vec());

        drop(rx);
        assert!(matches!(
            transmitter.transmit(b"again"),
            Err(TransportError::Closed)
        ));
    }

    #[cfg(feature = "udp")]
    #[tokio::test]
    async fn test_udp_transmitter_sends_to_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let transmitter = UdpTransmitter::bind("127.0.0.1:0".parse().unwrap(), peer_addr)
            .await
            .unwrap();
        assert_eq!(transmitter.peer_addr(), peer_addr);
        assert_ne!(transmitter.local_addr().unwrap().port(), 0);

        transmitter.transmit(b"ping").unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, transmitter.local_addr().unwrap());
    }

    #[cfg(feature = "udp")]
    #[tokio::test]
    async fn test_udp_exchange_acknowledged_by_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transmitter = UdpTransmitter::bind(
            "127.0.0.1:0".parse().unwrap(),
            peer.local_addr().unwrap(),
        )
        .await
        .unwrap();

        let params = TransmissionParams::builder()
            .transmission(1, Duration::from_millis(200), 4)
            .build()
            .unwrap();
        let scheduler = Arc::new(RetransmissionScheduler::new(params, transmitter));

        // Peer: answer the first datagram; the first two bytes carry the id.
        let responder = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let (len, _) = peer.recv_from(&mut buf).await.unwrap();
                assert_eq!(len, 4);
                let id = u16::from_be_bytes([buf[0], buf[1]]);
                scheduler.notify_ack(id)
            })
        };

        let result = scheduler
            .send(vec![0x12u8, 0x34, 0xca, 0xfe], ExchangeId::from(0x1234u16))
            .await;
        assert_eq!(result.unwrap(), Outcome::Acknowledged);
        assert!(responder.await.unwrap());
        assert_eq!(scheduler.in_flight(), 0);
    }
}
