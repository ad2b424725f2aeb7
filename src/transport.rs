//! Transport trait for datagram I/O

use std::net::SocketAddr;

use crate::Result;

/// Datagram transport used by the session loop.
///
/// Transports abstract over the network medium (UDP sockets in production,
/// in-memory scripts in tests). The trait covers exactly the two operations the
/// protocol needs.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram.
    ///
    /// Returns the number of bytes the medium accepted, which may be fewer than
    /// `datagram.len()`; the caller decides whether that counts as a failure.
    async fn send_to(&self, datagram: &[u8], destination: SocketAddr) -> Result<usize>;

    /// Receive the next datagram into `buf`, waiting with no deadline.
    ///
    /// Returns the datagram length. Callers wanting a deadline wrap this in
    /// `tokio::time::timeout`.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
}
