//! Command channel: bounded-retry sends of configuration frames
//!
//! Sends are synchronous with the session loop and are not queued. A send
//! succeeds when the transport accepts the full encoded frame on some attempt.

use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::transport::Transport;
use crate::types::xipp_ids::{module, processor, stream};
use crate::wire::ConfigFrame;
use crate::{Result, XippError};

pub const DEFAULT_SEND_ATTEMPTS: u32 = 3;

/// Rewrite a received configuration frame's source so it can be re-sent as a
/// request for the same target. The target is left untouched.
pub fn anonymize(frame: &mut ConfigFrame) {
    frame.header.processor = processor::ROOT;
    frame.header.module = module::PROCESSOR;
    frame.header.stream = stream::CONFIG;
    frame.header.time = 0;
}

/// Sends configuration frames to the instrument's request address.
pub struct CommandChannel<T> {
    transport: T,
    destination: SocketAddr,
    attempts: u32,
}

impl<T: Transport> CommandChannel<T> {
    pub fn new(transport: T, destination: SocketAddr, attempts: u32) -> Self {
        Self { transport, destination, attempts: attempts.max(1) }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode and send one frame, retrying short or failed sends.
    pub async fn send(&self, frame: &ConfigFrame) -> Result<()> {
        let datagram = frame.encode()?;
        self.send_datagram(&datagram).await?;
        debug!(
            "Sent {} for property {} on operator {}",
            if frame.is_query() { "query" } else { "write" },
            frame.target.property,
            frame.target.processor
        );
        Ok(())
    }

    pub async fn send_datagram(&self, datagram: &[u8]) -> Result<()> {
        let mut last_sent = None;
        for attempt in 1..=self.attempts {
            match self.transport.send_to(datagram, self.destination).await {
                Ok(sent) if sent == datagram.len() => return Ok(()),
                Ok(sent) => {
                    warn!(
                        "Short send on attempt {}/{}: {} of {} bytes",
                        attempt,
                        self.attempts,
                        sent,
                        datagram.len()
                    );
                    last_sent = Some(sent);
                }
                Err(e) => {
                    warn!("Send attempt {}/{} failed: {}", attempt, self.attempts, e);
                }
            }
        }
        Err(XippError::send_failure(self.attempts, datagram.len(), last_sent))
    }

    /// Receive the next datagram from the underlying transport.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.transport.recv(buf).await
    }
}
