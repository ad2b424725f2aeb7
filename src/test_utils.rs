//! Test utilities: frame builders and an in-memory scripted transport
//!
//! This module provides the fixtures shared by unit tests and benchmarks: a
//! standard Operator/trial layout, reply builders for every property the
//! session consumes, and a [`ScriptedTransport`] that records sends and
//! replays queued datagrams.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::transport::Transport;
use crate::types::xipp_ids::{module, property_id, property_type};
use crate::types::{
    ConfigTarget, FrameHeader, FrontEndSelection, OperatorProcessDescriptor, PropertyBlock,
    PropertyHeader, RecordingTrialDescriptor, SchemaVersion, SignalSelectionSet, StringProperty,
};
use crate::wire::{ConfigFrame, Property, encode_frame, frames};
use crate::{Result, XippError};

/// Processor ID used by the fixture Operator.
pub const OPERATOR_ID: u8 = 130;

/// Standard trial layout: block descriptor ID, first item ID, item count.
pub const EXT_INFO_BLOCK: (u16, u16, u16) = (9, 100, 4);
pub const SIG_SELECTION_BLOCK: (u16, u16, u16) = (12, 200, 16);
pub const FILE_NAMES_BLOCK: (u16, u16, u16) = (10, 300, 16);

/// Build a configuration reply as an Operator would broadcast it.
pub fn operator_frame(operator: u8, property: u16, value: &Property) -> ConfigFrame {
    ConfigFrame {
        header: FrameHeader { size: 0, processor: operator, module: 0, stream: 0, time: 1000 },
        target: ConfigTarget::new(operator, module::OPERATOR_PROCESS_MAIN, property),
        payload: value.encode(),
    }
}

pub fn operator_descriptor(schema: SchemaVersion) -> OperatorProcessDescriptor {
    OperatorProcessDescriptor {
        header: PropertyHeader::new(property_type::OPERATOR_DESCRIPTOR),
        property_count: 2,
        schema,
        vendor: "Ripple".to_string(),
        label: "Trellis".to_string(),
        version: "1.8".to_string(),
    }
}

pub fn operator_reply(operator: u8, schema: SchemaVersion) -> ConfigFrame {
    operator_frame(
        operator,
        property_id::OPERATOR_PROCESS_DESCRIPTOR,
        &Property::OperatorDescriptor(operator_descriptor(schema)),
    )
}

pub fn standard_trial() -> RecordingTrialDescriptor {
    RecordingTrialDescriptor::stopped(EXT_INFO_BLOCK.0, FILE_NAMES_BLOCK.0, SIG_SELECTION_BLOCK.0)
}

pub fn trial_reply(operator: u8, trial: &RecordingTrialDescriptor) -> ConfigFrame {
    operator_frame(
        operator,
        property_id::RECORDING_TRIAL_DESCRIPTOR,
        &Property::RecordingTrial(trial.clone()),
    )
}

pub fn block_reply(operator: u8, (id, first, count): (u16, u16, u16)) -> ConfigFrame {
    operator_frame(
        operator,
        id,
        &Property::Block(PropertyBlock::new(first, count, 0, "trial block")),
    )
}

/// Front end `index` publishing a continuous stream and an event run.
pub fn front_end(index: u8) -> FrontEndSelection {
    let module_id = 2 * index as u32 + 2;
    let sets = [
        SignalSelectionSet::new(0x0100_0000 | (module_id << 16) | (1 << 8), 32),
        SignalSelectionSet::new(0x0100_0000 | (module_id << 16) | (4 << 8) | 0x01, 32),
    ];
    FrontEndSelection::new(1, index / 4 + 1, index % 4 + 1, 'A', "micro", &sets)
}

/// Every block header and item reply for the standard layout, headers first.
pub fn standard_block_replies(operator: u8) -> Vec<ConfigFrame> {
    let mut replies = vec![
        block_reply(operator, EXT_INFO_BLOCK),
        block_reply(operator, SIG_SELECTION_BLOCK),
        block_reply(operator, FILE_NAMES_BLOCK),
    ];
    replies.extend(standard_item_replies(operator));
    replies
}

pub fn standard_item_replies(operator: u8) -> Vec<ConfigFrame> {
    let mut replies = Vec::new();
    let (_, first, count) = EXT_INFO_BLOCK;
    for i in 0..count {
        let text = if i == 0 { String::new() } else { format!("info {}", i) };
        replies.push(operator_frame(operator, first + i, &Property::String(StringProperty::new(256, &text))));
    }
    let (_, first, count) = SIG_SELECTION_BLOCK;
    for i in 0..count {
        replies.push(operator_frame(operator, first + i, &Property::FrontEndSelection(front_end(i as u8))));
    }
    let (_, first, count) = FILE_NAMES_BLOCK;
    for i in 0..count {
        let name = format!("/data/trial0001.f{:02}", i);
        replies.push(operator_frame(operator, first + i, &Property::String(StringProperty::new(512, &name))));
    }
    replies
}

/// Pack configuration frames back to back into one datagram.
pub fn datagram(frames: &[ConfigFrame]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for frame in frames {
        buf.extend(frame.encode()?);
    }
    Ok(buf)
}

/// A data frame with the given stream type word.
pub fn data_frame(module: u8, stream: u8, stream_type: u16) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&stream_type.to_le_bytes());
    payload.extend_from_slice(&0u16.to_le_bytes());
    payload.extend_from_slice(&[0u8; 64]);
    encode_frame(1, module, stream, 0, &payload)
}

/// Scripted result for the next send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Full,
    Short(usize),
    Fail,
}

enum Inbound {
    Datagram(Vec<u8>),
    Error(std::io::ErrorKind),
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    send_script: Mutex<VecDeque<SendOutcome>>,
    attempts: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory transport. Sends are recorded; receives replay datagrams pushed
/// through the paired [`TransportHandle`] and wait forever once none remain.
pub struct ScriptedTransport {
    shared: Arc<Shared>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
}

/// Test-side control of a [`ScriptedTransport`].
#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, TransportHandle) {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { shared: Arc::clone(&shared), inbound: tokio::sync::Mutex::new(rx) },
            TransportHandle { shared, inbound: tx },
        )
    }
}

impl TransportHandle {
    pub fn push_datagram(&self, datagram: Vec<u8>) {
        let _ = self.inbound.send(Inbound::Datagram(datagram));
    }

    pub fn push_frames(&self, frames: &[ConfigFrame]) -> Result<()> {
        self.push_datagram(datagram(frames)?);
        Ok(())
    }

    pub fn push_error(&self, kind: std::io::ErrorKind) {
        let _ = self.inbound.send(Inbound::Error(kind));
    }

    pub fn script_sends(&self, outcomes: impl IntoIterator<Item = SendOutcome>) {
        lock(&self.shared.send_script).extend(outcomes);
    }

    /// Datagrams accepted in full, in send order.
    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        lock(&self.shared.sent).clone()
    }

    /// Accepted datagrams decoded back into configuration frames.
    pub fn sent_frames(&self) -> Vec<ConfigFrame> {
        self.sent()
            .iter()
            .flat_map(|(_, bytes)| {
                frames(bytes)
                    .filter_map(|f| f.ok().and_then(|f| f.to_config().ok()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn send_attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn clear_sent(&self) {
        lock(&self.shared.sent).clear();
    }

    /// Wait until at least `count` datagrams have been accepted.
    pub async fn wait_for_sends(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if lock(&self.shared.sent).len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        lock(&self.shared.sent).len() >= count
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send_to(&self, datagram: &[u8], destination: SocketAddr) -> Result<usize> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.shared.send_script).pop_front().unwrap_or(SendOutcome::Full);
        match outcome {
            SendOutcome::Full => {
                lock(&self.shared.sent).push((destination, datagram.to_vec()));
                Ok(datagram.len())
            }
            SendOutcome::Short(n) => Ok(n.min(datagram.len())),
            SendOutcome::Fail => Err(XippError::transport(
                "scripted send",
                std::io::Error::other("scripted send failure"),
            )),
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let next = self.inbound.lock().await.recv().await;
        match next {
            Some(Inbound::Datagram(bytes)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            Some(Inbound::Error(kind)) => {
                Err(XippError::transport("scripted receive", std::io::Error::from(kind)))
            }
            None => std::future::pending().await,
        }
    }
}
