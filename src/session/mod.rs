//! Trial discovery and control state machine
//!
//! [`TrialSession`] performs no I/O. The control loop feeds it configuration
//! frames and user commands, and sends whatever frames it returns.
//!
//! ```text
//! AwaitingOperator -> AwaitingTrialDescriptor -> AwaitingDependentBlocks
//!                  -> AwaitingBlockItems -> Ready <-> Configuring
//! ```
//!
//! Discovery starts with a broadcast query for the Operator descriptor. Once an
//! Operator with a compatible property schema answers, every further query is
//! pinned to it: first the recording-trial descriptor, then the three blocks
//! it points at, then every member of those blocks. Replies are correlated by
//! property ID only, so they may arrive in any order and may repeat.
//!
//! ```rust
//! use xipp_trial::session::{SessionPhase, TrialSession};
//!
//! let mut session = TrialSession::new(Default::default(), 128, None);
//! let query = session.start();
//! assert_eq!(query.target.processor, 255);
//! assert_eq!(session.phase(), SessionPhase::AwaitingOperator);
//! ```

mod action;
mod tracker;


use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, trace, warn};

pub use action::{TrialAction, UserCommand, is_permitted, permitted_actions};
pub use tracker::{BlockItem, BlockRole, BlockTracker};

use crate::command::anonymize;
use crate::config::ClientConfig;
use crate::stats::NetworkStats;
use crate::types::xipp_ids::{module, processor, property_id};
use crate::types::{
    ConfigTarget, FrontEndSelection, OperatorProcessDescriptor, RecordingTrialDescriptor,
    SchemaVersion, TrialStatus,
};
use crate::wire::{ConfigFrame, Property};
use crate::{Result, XippError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    AwaitingOperator,
    AwaitingTrialDescriptor,
    AwaitingDependentBlocks,
    AwaitingBlockItems,
    Ready,
    /// A write was sent and the affected properties are being re-read.
    Configuring,
    /// The Operator speaks an incompatible property schema.
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::AwaitingOperator => "awaiting operator",
            SessionPhase::AwaitingTrialDescriptor => "awaiting trial descriptor",
            SessionPhase::AwaitingDependentBlocks => "awaiting dependent blocks",
            SessionPhase::AwaitingBlockItems => "awaiting block items",
            SessionPhase::Ready => "ready",
            SessionPhase::Configuring => "configuring",
            SessionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The Operator the session is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub id: u8,
    pub descriptor: OperatorProcessDescriptor,
}

/// Cached trial descriptor and the anonymized reply it came from.
#[derive(Debug, Clone)]
struct TrialRecord {
    request: ConfigFrame,
    descriptor: RecordingTrialDescriptor,
    /// Last descriptor the Operator sent, without local changes.
    confirmed: RecordingTrialDescriptor,
}

impl TrialRecord {
    fn query(&self) -> ConfigFrame {
        ConfigFrame { payload: Vec::new(), ..self.request.clone() }
    }

    fn write(&self) -> ConfigFrame {
        ConfigFrame {
            payload: Property::RecordingTrial(self.descriptor.clone()).encode(),
            ..self.request.clone()
        }
    }
}

/// Point-in-time view of everything the session knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialSnapshot {
    pub phase: SessionPhase,
    pub operator: Option<OperatorInfo>,
    pub trial: Option<RecordingTrialDescriptor>,
    pub comment: Option<String>,
    pub file_names: Vec<String>,
    pub front_ends: Vec<FrontEndSelection>,
    pub blocks_received: usize,
    pub items_received: usize,
    pub items_expected: usize,
    /// Expected and advertised schema when an incompatible Operator ended the session.
    pub schema_mismatch: Option<(SchemaVersion, SchemaVersion)>,
    pub network: NetworkStats,
}

impl TrialSnapshot {
    pub fn status(&self) -> Option<TrialStatus> {
        self.trial.as_ref().map(|trial| trial.status)
    }

    /// The error that ended a failed session.
    pub fn failure(&self) -> Option<XippError> {
        if self.phase != SessionPhase::Failed {
            return None;
        }
        Some(match self.schema_mismatch {
            Some((expected, found)) => XippError::SchemaMismatch {
                expected: (expected.major, expected.minor),
                found: (found.major, found.minor),
            },
            None => XippError::SessionClosed,
        })
    }

    /// Multi-line human-readable description.
    pub fn summary(&self) -> String {
        let mut out = format!("Session: {}\n", self.phase);
        if let Some(operator) = &self.operator {
            out.push_str(&format!(
                "Operator {}: {} {} version {} (schema {})\n",
                operator.id,
                operator.descriptor.vendor,
                operator.descriptor.label,
                operator.descriptor.version,
                operator.descriptor.schema
            ));
        }
        if let Some(trial) = &self.trial {
            out.push_str(&format!("Trial: {}\n", trial.status));
            out.push_str(&format!(
                "  Elapsed: {:.1} s  Size: {:.2} MB  Rate: {:.1} MB/s  Free: {:.0} MB\n",
                trial.trial_elapsed_ms as f64 / 1000.0,
                trial.trial_size_mb(),
                trial.data_rate,
                trial.remaining_disk_mb
            ));
            if !trial.file_path_base.is_empty() {
                out.push_str(&format!("  Path base: {}\n", trial.file_path_base));
            }
            if !trial.file_error.is_empty() {
                out.push_str(&format!("  File error: {}\n", trial.file_error));
            }
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!("  Comment: {}\n", comment));
        }
        for name in &self.file_names {
            out.push_str(&format!("  File: {}\n", name));
        }
        for fe in &self.front_ends {
            let selected = fe.selected_signals().len();
            let total = fe.signals().len();
            if total > 0 {
                out.push_str(&format!(
                    "  Front end {}-{}{} {}: {}/{} signals selected\n",
                    fe.processor, fe.port_char, fe.front_end, fe.label, selected, total
                ));
            }
        }
        out.push_str(&format!(
            "  Blocks {}/3, items {}/{}, {} datagrams\n",
            self.blocks_received, self.items_received, self.items_expected, self.network.datagrams
        ));
        out
    }
}

/// Discovery and control state for one Operator's recording trial.
#[derive(Debug)]
pub struct TrialSession {
    expected_schema: SchemaVersion,
    operator_processor_min: u8,
    file_path_base: Option<String>,
    operator: Option<OperatorInfo>,
    failed: bool,
    /// Schema of the Operator that failed the session, if any.
    rejected_schema: Option<SchemaVersion>,
    trial: Option<TrialRecord>,
    descriptor_received: bool,
    trial_query_lost: bool,
    /// Empty until the first trial descriptor names the block IDs.
    blocks: Vec<BlockTracker>,
    configuring: bool,
}

impl TrialSession {
    pub fn new(
        expected_schema: SchemaVersion,
        operator_processor_min: u8,
        file_path_base: Option<String>,
    ) -> Self {
        Self {
            expected_schema,
            operator_processor_min,
            file_path_base,
            operator: None,
            failed: false,
            rejected_schema: None,
            trial: None,
            descriptor_received: false,
            trial_query_lost: false,
            blocks: Vec::new(),
            configuring: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.expected_schema,
            config.operator_processor_min,
            config.file_path_base.clone(),
        )
    }

    /// Broadcast query for the Operator process descriptor.
    pub fn start(&self) -> ConfigFrame {
        ConfigFrame::query(ConfigTarget::new(
            processor::ALL,
            module::OPERATOR_PROCESS_MAIN,
            property_id::OPERATOR_PROCESS_DESCRIPTOR,
        ))
    }

    pub fn phase(&self) -> SessionPhase {
        if self.failed {
            SessionPhase::Failed
        } else if self.operator.is_none() {
            SessionPhase::AwaitingOperator
        } else if self.configuring {
            SessionPhase::Configuring
        } else if self.is_complete() {
            SessionPhase::Ready
        } else if !self.descriptor_received {
            SessionPhase::AwaitingTrialDescriptor
        } else if !self.blocks.iter().all(BlockTracker::header_received) {
            SessionPhase::AwaitingDependentBlocks
        } else {
            SessionPhase::AwaitingBlockItems
        }
    }

    pub fn operator(&self) -> Option<&OperatorInfo> {
        self.operator.as_ref()
    }

    /// Cached descriptor, including optimistic local status changes.
    pub fn trial(&self) -> Option<&RecordingTrialDescriptor> {
        self.trial.as_ref().map(|record| &record.descriptor)
    }

    pub fn tracker(&self, role: BlockRole) -> Option<&BlockTracker> {
        self.blocks.iter().find(|tracker| tracker.role() == role)
    }

    fn tracker_mut(&mut self, role: BlockRole) -> Option<&mut BlockTracker> {
        self.blocks.iter_mut().find(|tracker| tracker.role() == role)
    }

    pub fn blocks_received(&self) -> usize {
        self.blocks.iter().filter(|tracker| tracker.header_received()).count()
    }

    /// Recomputed from the filled item slots on every call.
    pub fn items_received(&self) -> usize {
        self.blocks.iter().map(BlockTracker::items_received).sum()
    }

    pub fn items_expected(&self) -> usize {
        self.blocks.iter().map(BlockTracker::items_expected).sum()
    }

    fn is_complete(&self) -> bool {
        self.descriptor_received
            && self.blocks.len() == BlockRole::ALL.len()
            && self.blocks_received() == BlockRole::ALL.len()
            && self.items_received() == self.items_expected()
    }

    /// Feed one received configuration frame; returns the frames to send next.
    ///
    /// Only a schema mismatch is an error. Frames from hardware processors,
    /// other Operators, and unmapped properties are ignored.
    pub fn handle_frame(&mut self, frame: &ConfigFrame) -> Result<Vec<ConfigFrame>> {
        if self.failed {
            return Ok(Vec::new());
        }
        if frame.source() < self.operator_processor_min {
            trace!("Ignoring config frame from processor {}", frame.source());
            return Ok(Vec::new());
        }
        if frame.is_query() {
            trace!("Ignoring query for property {}", frame.target.property);
            return Ok(Vec::new());
        }

        let before = self.phase();
        let operator_id = self.operator.as_ref().map(|operator| operator.id);
        let outgoing = match operator_id {
            None if frame.target.property == property_id::OPERATOR_PROCESS_DESCRIPTOR => {
                self.accept_operator(frame)?
            }
            None => {
                trace!("No Operator yet, ignoring property {}", frame.target.property);
                Vec::new()
            }
            Some(id) if frame.target.processor != id => {
                trace!("Ignoring frame for Operator {}", frame.target.processor);
                Vec::new()
            }
            Some(_) if frame.target.property == property_id::RECORDING_TRIAL_DESCRIPTOR => {
                self.accept_trial(frame)
            }
            Some(_) => self.accept_block_frame(frame),
        };

        if self.configuring && self.is_complete() {
            self.configuring = false;
        }
        self.log_phase_change(before);
        Ok(outgoing)
    }

    fn accept_operator(&mut self, frame: &ConfigFrame) -> Result<Vec<ConfigFrame>> {
        let Some(Property::OperatorDescriptor(descriptor)) = decode_property(frame) else {
            return Ok(Vec::new());
        };
        let id = frame.target.processor;
        info!(
            "Detected Operator {}: {} {} version {} (schema {})",
            id, descriptor.vendor, descriptor.label, descriptor.version, descriptor.schema
        );

        if descriptor.schema != self.expected_schema {
            error!(
                "Operator property schema {} is not compatible with {}",
                descriptor.schema, self.expected_schema
            );
            self.failed = true;
            self.rejected_schema = Some(descriptor.schema);
            return Err(XippError::SchemaMismatch {
                expected: (self.expected_schema.major, self.expected_schema.minor),
                found: (descriptor.schema.major, descriptor.schema.minor),
            });
        }

        self.operator = Some(OperatorInfo { id, descriptor });
        Ok(vec![trial_query(id)])
    }

    fn accept_trial(&mut self, frame: &ConfigFrame) -> Vec<ConfigFrame> {
        let Some(Property::RecordingTrial(descriptor)) = decode_property(frame) else {
            return Vec::new();
        };
        debug!(
            "Trial descriptor: {}, {:.2} MB, blocks ext={} sig={} files={}",
            descriptor.status,
            descriptor.trial_size_mb(),
            descriptor.ext_info_block,
            descriptor.sig_selection_block,
            descriptor.file_names_block
        );

        self.retarget_blocks(&descriptor);
        let mut request = frame.clone();
        anonymize(&mut request);
        let confirmed = descriptor.clone();
        self.trial = Some(TrialRecord { request, descriptor, confirmed });
        self.descriptor_received = true;
        self.trial_query_lost = false;

        if self.is_complete() && !self.configuring {
            return Vec::new();
        }
        self.query_missing_headers(frame.target)
    }

    /// Query every block header not yet asked for.
    fn query_missing_headers(&mut self, trial_target: ConfigTarget) -> Vec<ConfigFrame> {
        self.blocks
            .iter_mut()
            .filter(|tracker| tracker.needs_header_query())
            .map(|tracker| {
                tracker.mark_header_queried();
                ConfigFrame::query(trial_target.with_property(tracker.id()))
            })
            .collect()
    }

    /// Undo what the session assumed when it produced `frame`, which could
    /// not be sent. Lost queries are re-issued by [`TrialSession::tick`].
    pub fn send_failed(&mut self, frame: &ConfigFrame) {
        let id = frame.target.property;
        if self.failed || self.operator.is_none() {
            return;
        }

        if id == property_id::RECORDING_TRIAL_DESCRIPTOR {
            if frame.is_query() {
                if !self.descriptor_received {
                    warn!("Trial query was not sent, retrying on the next tick");
                    self.trial_query_lost = true;
                }
            } else if let Some(record) = self.trial.as_mut() {
                warn!(
                    "Trial write was not sent, keeping status {}",
                    record.confirmed.status
                );
                record.descriptor = record.confirmed.clone();
                self.configuring = false;
            }
            return;
        }

        // a lost item write is repaired by the re-query sent after it
        if !frame.is_query() {
            return;
        }
        for tracker in &mut self.blocks {
            let header = tracker.id() == id && !tracker.header_received();
            if header || tracker.contains_item(id) {
                warn!(
                    "Query for property {} was not sent, re-reading {} block",
                    id,
                    tracker.role().name()
                );
                tracker.reset();
            }
        }
    }

    /// Point the trackers at the descriptor's blocks, discarding any whose ID changed.
    fn retarget_blocks(&mut self, descriptor: &RecordingTrialDescriptor) {
        if self.blocks.is_empty() {
            self.blocks = BlockRole::ALL
                .iter()
                .map(|&role| BlockTracker::new(role, role.block_id(descriptor)))
                .collect();
            return;
        }
        for tracker in &mut self.blocks {
            let id = tracker.role().block_id(descriptor);
            if tracker.id() != id {
                debug!("{} block moved from {} to {}", tracker.role().name(), tracker.id(), id);
                *tracker = BlockTracker::new(tracker.role(), id);
            }
        }
    }

    fn accept_block_frame(&mut self, frame: &ConfigFrame) -> Vec<ConfigFrame> {
        let id = frame.target.property;

        if self.blocks.iter().any(|t| t.id() == id && !t.header_received()) {
            let Some(Property::Block(block)) = decode_property(frame) else {
                return Vec::new();
            };
            return self
                .blocks
                .iter_mut()
                .filter(|t| t.id() == id && !t.header_received())
                .flat_map(|t| t.accept_header(frame.target, block.clone()))
                .collect();
        }

        if self.blocks.iter().any(|t| t.contains_item(id)) {
            if let Some(property) = decode_property(frame) {
                for tracker in self.blocks.iter_mut().filter(|t| t.contains_item(id)) {
                    tracker.accept_item(frame.target, property.clone());
                }
                trace!("Stored item {} ({}/{})", id, self.items_received(), self.items_expected());
            }
            return Vec::new();
        }

        trace!("Ignoring unmapped property {}", id);
        Vec::new()
    }

    /// Apply a user command; returns the frames to send.
    ///
    /// Illegal commands are rejected with [`XippError::CommandRejected`] and
    /// produce no frames.
    pub fn handle_command(&mut self, command: UserCommand) -> Result<Vec<ConfigFrame>> {
        let Some(action) = command.action() else {
            return Ok(Vec::new());
        };
        if self.failed {
            return Err(XippError::command_rejected(
                action.name(),
                "session stopped after a schema mismatch",
            ));
        }
        let Some(operator_id) = self.operator.as_ref().map(|operator| operator.id) else {
            return Err(XippError::command_rejected(action.name(), "no Operator detected yet"));
        };

        let before = self.phase();
        if action == TrialAction::Query {
            info!("Re-reading trial configuration");
            self.reset_tracking();
            self.configuring = false;
            self.log_phase_change(before);
            return Ok(vec![trial_query(operator_id)]);
        }

        if before != SessionPhase::Ready {
            return Err(XippError::command_rejected(
                action.name(),
                format!("trial configuration is not loaded ({})", before),
            ));
        }
        let Some(status) = self.trial().map(|trial| trial.status) else {
            return Err(XippError::command_rejected(action.name(), "no trial descriptor"));
        };
        if !is_permitted(status, action) {
            return Err(XippError::command_rejected(
                action.name(),
                format!("not allowed while the trial is {}", status),
            ));
        }

        let outgoing = match command {
            UserCommand::Start | UserCommand::Pause | UserCommand::Unpause | UserCommand::Stop => {
                self.request_status(action, operator_id)
            }
            UserCommand::Comment(text) => self.write_comment(&text)?,
            UserCommand::SetSignalSelection { guid, selected } => {
                self.write_selection(guid, selected)?
            }
            UserCommand::Query | UserCommand::Exit => Vec::new(),
        };
        self.log_phase_change(before);
        Ok(outgoing)
    }

    fn request_status(&mut self, action: TrialAction, operator_id: u8) -> Vec<ConfigFrame> {
        let Some(requested) = action.requested_status() else {
            return Vec::new();
        };
        let Some(record) = self.trial.as_mut() else {
            return Vec::new();
        };
        record.descriptor.status = requested;
        if action == TrialAction::Start {
            record.descriptor.trial_start = 0;
            if let Some(base) = &self.file_path_base {
                record.descriptor.file_path_base = base.clone();
            }
        }
        info!("Requesting {}: trial now {}", action, requested);
        let write = record.write();

        self.reset_tracking();
        self.configuring = true;
        vec![write, trial_query(operator_id)]
    }

    fn write_comment(&mut self, text: &str) -> Result<Vec<ConfigFrame>> {
        let rejected = |reason| XippError::command_rejected(TrialAction::Comment.name(), reason);
        let tracker =
            self.tracker_mut(BlockRole::ExtendedInfo).ok_or_else(|| rejected("no trial"))?;
        let item = tracker.item(0).cloned().ok_or_else(|| rejected("comment property not loaded"))?;
        let Property::String(mut comment) = item.property else {
            return Err(rejected("comment property is not a string"));
        };

        if comment.set_value(text) {
            warn!("Comment truncated to {} bytes", comment.max_length);
        }
        info!("Writing {} byte comment", comment.length());
        let mut outgoing = vec![ConfigFrame::write(item.target, &Property::String(comment))];
        outgoing.extend(tracker.clear_item(0));
        self.configuring = true;
        Ok(outgoing)
    }

    fn write_selection(&mut self, guid: u32, selected: bool) -> Result<Vec<ConfigFrame>> {
        let rejected =
            |reason: String| XippError::command_rejected(TrialAction::SelectSignal.name(), reason);
        let tracker = self
            .tracker_mut(BlockRole::SignalSelection)
            .ok_or_else(|| rejected("no trial".to_string()))?;

        let found = (0..tracker.items_expected()).find_map(|index| {
            let item = tracker.item(index)?;
            let fe = item.property.as_front_end_selection()?;
            fe.has_signal(guid).then(|| (index, item.target, fe.clone()))
        });
        let Some((index, target, mut fe)) = found else {
            return Err(rejected(format!("signal {:#010x} is not on any front end", guid)));
        };

        fe.set_selection(guid, selected);
        info!(
            "{} signal {:#010x} on front end {}",
            if selected { "Selecting" } else { "Clearing" },
            guid,
            fe.label
        );
        let mut outgoing = vec![ConfigFrame::write(target, &Property::FrontEndSelection(fe))];
        outgoing.extend(tracker.clear_item(index));
        self.configuring = true;
        Ok(outgoing)
    }

    /// Periodic work: re-issue queries that could not be sent, otherwise
    /// re-read the trial descriptor while a trial is active.
    pub fn tick(&mut self) -> Vec<ConfigFrame> {
        if self.failed {
            return Vec::new();
        }
        if let Some(operator_id) = self.operator.as_ref().map(|operator| operator.id) {
            if self.trial_query_lost {
                self.trial_query_lost = false;
                return vec![trial_query(operator_id)];
            }
        }
        if self.descriptor_received {
            if let Some(target) = self.trial.as_ref().map(|record| record.request.target) {
                let retried = self.query_missing_headers(target);
                if !retried.is_empty() {
                    return retried;
                }
            }
        }

        match &self.trial {
            Some(record)
                if self.phase() == SessionPhase::Ready
                    && record.descriptor.status != TrialStatus::Stopped =>
            {
                vec![record.query()]
            }
            _ => Vec::new(),
        }
    }

    /// Forget the trial and block replies so the whole cycle runs again.
    /// The cached descriptor is kept for display.
    fn reset_tracking(&mut self) {
        self.descriptor_received = false;
        self.blocks.iter_mut().for_each(BlockTracker::reset);
    }

    fn log_phase_change(&self, before: SessionPhase) {
        let after = self.phase();
        if after != before {
            info!("Trial session {} -> {}", before, after);
        }
    }

    pub fn snapshot(&self) -> TrialSnapshot {
        let file_names = self
            .tracker(BlockRole::FileNames)
            .map(|t| {
                t.items()
                    .filter_map(|item| item.property.as_string())
                    .map(|s| s.value().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let comment = self
            .tracker(BlockRole::ExtendedInfo)
            .and_then(|t| t.item(0))
            .and_then(|item| item.property.as_string())
            .map(|s| s.value().to_string());
        let front_ends = self
            .tracker(BlockRole::SignalSelection)
            .map(|t| {
                t.items().filter_map(|item| item.property.as_front_end_selection().cloned()).collect()
            })
            .unwrap_or_default();

        TrialSnapshot {
            phase: self.phase(),
            operator: self.operator.clone(),
            trial: self.trial().cloned(),
            comment,
            file_names,
            front_ends,
            blocks_received: self.blocks_received(),
            items_received: self.items_received(),
            items_expected: self.items_expected(),
            schema_mismatch: self.rejected_schema.map(|found| (self.expected_schema, found)),
            network: NetworkStats::default(),
        }
    }
}

fn trial_query(operator_id: u8) -> ConfigFrame {
    ConfigFrame::query(ConfigTarget::new(
        operator_id,
        module::OPERATOR_PROCESS_MAIN,
        property_id::RECORDING_TRIAL_DESCRIPTOR,
    ))
}

/// Decode a reply payload, logging and dropping anything undecodable.
fn decode_property(frame: &ConfigFrame) -> Option<Property> {
    match frame.property() {
        Ok(property) => property,
        Err(e) => {
            warn!("Undecodable payload for property {}: {}", frame.target.property, e);
            None
        }
    }
}
