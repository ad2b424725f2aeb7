//! Protocol value types for the instrument network.
//!
//! This module provides the typed views of the packed little-endian structures
//! exchanged with an Operator, plus the pure addressing operations over them.
//!
//! ## Architecture
//!
//! - [`FrameHeader`], [`ConfigTarget`], [`PropertyHeader`] are the fixed headers
//!   that prefix every frame, configuration frame, and property payload
//! - [`BoolProperty`], [`IntProperty`], [`StringProperty`] are the scalar properties
//! - [`PropertyBlock`] and [`PropertyList`] address other properties by ID
//! - [`SignalSelectionSet`] and [`FrontEndSelection`] model per-front-end signal
//!   selection bitmasks with their GUID arithmetic
//! - [`RecordingTrialDescriptor`] and [`OperatorProcessDescriptor`] describe the
//!   remote recording trial and the Operator serving it
//!
//! Each structure decodes from and encodes into its exact wire layout; decoding
//! is bounds-checked and reports [`crate::XippError::Parse`] on short payloads.
//!
//! ## Usage Example
//!
//! ```rust
//! use xipp_trial::types::{PropertyBlock, SignalSelectionSet};
//!
//! let block = PropertyBlock::new(200, 16, 6, "file names");
//! assert!(block.contains(215));
//! assert!(!block.contains(216));
//!
//! let mut set = SignalSelectionSet::new(0x0102_0300, 4);
//! let signal = set.signal_guid_at(2).unwrap();
//! assert!(set.set_selection(signal, true));
//! assert!(set.is_selected(signal));
//! ```

mod bitfield;
mod block;
mod data;
mod header;
mod scalar;
mod selection;
mod trial;
pub mod xipp_ids;

pub use bitfield::{BitField, time_after_u32};
pub use block::{PropertyBlock, PropertyList};
pub use data::{DataFrameKind, SegmentInfo};
pub use header::{ConfigTarget, FrameHeader, PropertyHeader};
pub use scalar::{BoolProperty, IntProperty, StringProperty};
pub use selection::{
    FrontEndSelection, MAX_SIGNALS_PER_SET, SIGNAL_TYPE_SLOTS, SignalSelectionSet,
};
pub use trial::{
    DigitalTriggerDescriptor, OperatorProcessDescriptor, RecordingTrialDescriptor, SchemaVersion,
    TrialStatus,
};
