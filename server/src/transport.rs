//! Transport layer: how raw datagrams reach and leave the server core.
//!
//! The core never touches a socket. It sees a [`Transport`]: a queue of
//! inbound `(endpoint, bytes)` pairs it drains once per tick, and a
//! fire-and-forget send. [`UdpTransport`] backs that contract with a real
//! socket; [`MemoryTransport`] backs it with in-process queues for
//! deterministic drivers and tests.

use std::collections::VecDeque;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Network identity of a session: address plus port. Two packets with an
/// equal endpoint belong to the same session; differing in either field
/// means a different client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Resolves the endpoint back to a socket address, if the address part
    /// is a literal IP. Symbolic addresses (as used by in-memory drivers)
    /// are not routable.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        self.address
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// The server core's view of the network.
pub trait Transport {
    /// Returns and clears everything received since the last drain,
    /// preserving arrival order. Never blocks.
    fn drain(&mut self) -> Vec<(Endpoint, Vec<u8>)>;

    /// Queues one outbound datagram. No delivery guarantee; reliability is
    /// layered on top by the server's pending-ack machinery.
    fn send(&mut self, endpoint: &Endpoint, data: &[u8]);
}

/// In-process transport backed by a pair of queues.
///
/// Drivers and tests push inbound packets with [`enqueue`] and inspect what
/// the server emitted through the outbound queue.
///
/// [`enqueue`]: MemoryTransport::enqueue
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<(Endpoint, Vec<u8>)>,
    outbound: VecDeque<(Endpoint, Vec<u8>)>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposits an inbound packet for a later drain.
    pub fn enqueue(&mut self, endpoint: Endpoint, data: Vec<u8>) {
        self.inbound.push_back((endpoint, data));
    }

    /// Number of outbound packets the server has emitted and nobody has
    /// popped yet.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Pops the oldest outbound packet, if any.
    pub fn pop_outbound(&mut self) -> Option<(Endpoint, Vec<u8>)> {
        self.outbound.pop_front()
    }
}

impl Transport for MemoryTransport {
    fn drain(&mut self) -> Vec<(Endpoint, Vec<u8>)> {
        self.inbound.drain(..).collect()
    }

    fn send(&mut self, endpoint: &Endpoint, data: &[u8]) {
        self.outbound.push_back((endpoint.clone(), data.to_vec()));
    }
}

const RECV_BUFFER_SIZE: usize = 2048;

/// UDP-backed transport. A spawned task receives datagrams and feeds them
/// into an unbounded channel; the tick loop drains that channel without
/// blocking. Sends go straight out on the socket.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    inbound: mpsc::UnboundedReceiver<(Endpoint, Vec<u8>)>,
}

impl UdpTransport {
    /// Binds the socket and starts the receive task. Must be called from
    /// within a tokio runtime.
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        // Observe write-readiness once so later try_send_to calls don't
        // report WouldBlock before the reactor has polled the socket.
        socket.writable().await?;
        info!("listening on {}", socket.local_addr()?);

        let (tx, rx) = mpsc::unbounded_channel();
        let recv_socket = Arc::clone(&socket);

        tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];

            loop {
                match recv_socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let packet = (Endpoint::from(addr), buffer[..len].to_vec());
                        if tx.send(packet).is_err() {
                            // Transport dropped; nothing left to feed.
                            break;
                        }
                    }
                    Err(e) => {
                        error!("error receiving packet: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });

        Ok(Self {
            socket,
            inbound: rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn drain(&mut self) -> Vec<(Endpoint, Vec<u8>)> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.inbound.try_recv() {
            packets.push(packet);
        }
        packets
    }

    fn send(&mut self, endpoint: &Endpoint, data: &[u8]) {
        match endpoint.to_socket_addr() {
            Some(addr) => {
                if let Err(e) = self.socket.try_send_to(data, addr) {
                    warn!("failed to send {} bytes to {}: {}", data.len(), addr, e);
                }
            }
            None => warn!("dropping send to unroutable endpoint {}", endpoint),
        }
    }
}
