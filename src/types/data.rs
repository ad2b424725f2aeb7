//! Data-stream frame classification

use serde::{Deserialize, Serialize};

use super::xipp_ids::stream_type;

/// Stream type carried in the first payload field of a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFrameKind {
    Undefined,
    /// One sample per channel of a channel group at one time point.
    Continuous,
    /// Sequential samples of one channel, e.g. a spike waveform.
    Segment,
    /// Compressed min/max data for raster displays.
    Digest,
    LegacyDigital,
    Other(u16),
}

impl DataFrameKind {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            stream_type::UNDEFINED => DataFrameKind::Undefined,
            stream_type::CONTINUOUS => DataFrameKind::Continuous,
            stream_type::SEGMENT => DataFrameKind::Segment,
            stream_type::DIGEST => DataFrameKind::Digest,
            stream_type::LEGACY_DIGITAL => DataFrameKind::LegacyDigital,
            other => DataFrameKind::Other(other),
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            DataFrameKind::Undefined => stream_type::UNDEFINED,
            DataFrameKind::Continuous => stream_type::CONTINUOUS,
            DataFrameKind::Segment => stream_type::SEGMENT,
            DataFrameKind::Digest => stream_type::DIGEST,
            DataFrameKind::LegacyDigital => stream_type::LEGACY_DIGITAL,
            DataFrameKind::Other(raw) => raw,
        }
    }
}

/// Spike segment fields that follow the stream type and running counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// 0 unsorted, 1-16 sorted unit, 255 noise
    pub class_id: u16,
    pub sample_count: u16,
}
