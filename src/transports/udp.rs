//! UDP transport for the instrument network
//!
//! The instrument broadcasts data and configuration acknowledgements on one
//! well-known port and listens for configuration requests on another. The
//! client binds the broadcast port to receive and sends requests from the same
//! socket.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, trace};

use crate::transport::Transport;
use crate::{Result, XippError};

#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind the listening socket with broadcast sends enabled.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        debug!(addr = %addr, "Binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            error!(addr = %addr, error = %e, "Failed to bind UDP socket");
            XippError::transport(format!("bind {}", addr), e)
        })?;
        socket.set_broadcast(true).map_err(|e| XippError::transport("enable broadcast", e))?;

        let local_addr =
            socket.local_addr().map_err(|e| XippError::transport("read local address", e))?;
        debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, datagram: &[u8], destination: SocketAddr) -> Result<usize> {
        trace!(remote = %destination, bytes = datagram.len(), "Sending datagram");
        self.socket
            .send_to(datagram, destination)
            .await
            .map_err(|e| XippError::transport(format!("send to {}", destination), e))
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let (len, from) =
            self.socket.recv_from(buf).await.map_err(|e| XippError::transport("receive", e))?;
        trace!(remote = %from, bytes = len, "Received datagram");
        Ok(len)
    }
}
