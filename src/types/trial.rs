//! Operator and recording-trial descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

use super::header::PropertyHeader;
use super::xipp_ids::{property_type, schema};
use crate::Result;
use crate::wire::bytes::{
    put_f32_le, put_fixed_str, put_i32_le, put_u16_le, put_u32_le, read_f32_le, read_fixed_str,
    read_i32_le, read_u16_le, read_u32_le, read_u8,
};

/// Property schema version advertised by an Operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u8,
    pub minor: u8,
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self { major: schema::VERSION_MAJOR, minor: schema::VERSION_MINOR }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Identity of an Operator process, fetched once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorProcessDescriptor {
    pub header: PropertyHeader,
    pub property_count: u16,
    pub schema: SchemaVersion,
    pub vendor: String,
    pub label: String,
    pub version: String,
}

impl OperatorProcessDescriptor {
    pub const ENCODED_LEN: usize = 56;
    const TEXT_LEN: usize = 16;

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            header: PropertyHeader::decode(data)?,
            property_count: read_u16_le(data, 4, "operator descriptor")?,
            schema: SchemaVersion {
                major: read_u8(data, 6, "operator descriptor")?,
                minor: read_u8(data, 7, "operator descriptor")?,
            },
            vendor: read_fixed_str(data, 8, Self::TEXT_LEN, "operator descriptor")?,
            label: read_fixed_str(data, 24, Self::TEXT_LEN, "operator descriptor")?,
            version: read_fixed_str(data, 40, Self::TEXT_LEN, "operator descriptor")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_u16_le(buf, self.property_count);
        buf.push(self.schema.major);
        buf.push(self.schema.minor);
        put_fixed_str(buf, &self.vendor, Self::TEXT_LEN);
        put_fixed_str(buf, &self.label, Self::TEXT_LEN);
        put_fixed_str(buf, &self.version, Self::TEXT_LEN);
    }
}

/// Lifecycle state of a recording trial.
///
/// ```text
/// Stopped -> StartRequested -> Recording -> PauseRequested -> Paused
///         -> UnpauseRequested -> Recording -> StopRequested -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialStatus {
    Stopped,
    Recording,
    Paused,
    StopRequested,
    StartRequested,
    PauseRequested,
    UnpauseRequested,
    /// A status value this library does not know.
    Unknown(u32),
}

impl TrialStatus {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => TrialStatus::Stopped,
            2 => TrialStatus::Recording,
            3 => TrialStatus::Paused,
            4 => TrialStatus::StopRequested,
            5 => TrialStatus::StartRequested,
            6 => TrialStatus::PauseRequested,
            7 => TrialStatus::UnpauseRequested,
            other => TrialStatus::Unknown(other),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            TrialStatus::Stopped => 1,
            TrialStatus::Recording => 2,
            TrialStatus::Paused => 3,
            TrialStatus::StopRequested => 4,
            TrialStatus::StartRequested => 5,
            TrialStatus::PauseRequested => 6,
            TrialStatus::UnpauseRequested => 7,
            TrialStatus::Unknown(raw) => raw,
        }
    }

    /// Whether a change has been requested but not yet confirmed by the Operator.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            TrialStatus::StopRequested
                | TrialStatus::StartRequested
                | TrialStatus::PauseRequested
                | TrialStatus::UnpauseRequested
        )
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialStatus::Stopped => f.write_str("STOPPED"),
            TrialStatus::Recording => f.write_str("RECORDING"),
            TrialStatus::Paused => f.write_str("PAUSED"),
            TrialStatus::StopRequested => f.write_str("STOPPING..."),
            TrialStatus::StartRequested => f.write_str("STARTING..."),
            TrialStatus::PauseRequested => f.write_str("PAUSING..."),
            TrialStatus::UnpauseRequested => f.write_str("UNPAUSING..."),
            TrialStatus::Unknown(raw) => write!(f, "UNKNOWN({})", raw),
        }
    }
}

/// Cached copy of the Operator's recording-trial descriptor.
///
/// Times are sample-clock values; sizes are bytes. Fields marked read-only on
/// the Operator are carried so that a written descriptor echoes them back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingTrialDescriptor {
    pub header: PropertyHeader,
    pub locked: u32,
    pub change_count: u32,
    pub format: u32,
    pub auto_stop_time: u32,
    pub auto_segment_enabled: u32,
    pub auto_segment_size: f32,
    pub auto_segment_units: i32,
    pub auto_increment_enabled: u32,
    pub auto_increment_number: u32,
    // IDs of the block descriptors owned by this trial
    pub ext_info_block: u16,
    pub file_names_block: u16,
    pub prev_paths_block: u16,
    pub sig_selection_block: u16,
    pub dig_trigger_block: u16,
    pub status: TrialStatus,
    pub data_rate: f32,
    pub remaining_disk_mb: f32,
    pub trial_start: u32,
    pub trial_pause: u32,
    pub trial_stop: u32,
    pub trial_elapsed_ms: u32,
    pub trial_size: f32,
    pub segment_count: u32,
    pub segment_start: u32,
    pub segment_pause: u32,
    pub segment_stop: u32,
    pub segment_elapsed_ms: u32,
    pub segment_size: f32,
    pub file_path_base: String,
    pub file_error: String,
}

impl RecordingTrialDescriptor {
    pub const ENCODED_LEN: usize = 874;
    const FILE_PATH_LEN: usize = 512;
    const FILE_ERROR_LEN: usize = 256;

    /// A stopped trial whose dependent blocks live at the given IDs.
    pub fn stopped(ext_info_block: u16, file_names_block: u16, sig_selection_block: u16) -> Self {
        Self {
            header: PropertyHeader::new(property_type::RECORDING_TRIAL_DESCRIPTOR),
            locked: 0,
            change_count: 0,
            format: 0,
            auto_stop_time: 0,
            auto_segment_enabled: 0,
            auto_segment_size: 0.0,
            auto_segment_units: 0,
            auto_increment_enabled: 0,
            auto_increment_number: 0,
            ext_info_block,
            file_names_block,
            prev_paths_block: 0,
            sig_selection_block,
            dig_trigger_block: 0,
            status: TrialStatus::Stopped,
            data_rate: 0.0,
            remaining_disk_mb: 0.0,
            trial_start: 0,
            trial_pause: 0,
            trial_stop: 0,
            trial_elapsed_ms: 0,
            trial_size: 0.0,
            segment_count: 0,
            segment_start: 0,
            segment_pause: 0,
            segment_stop: 0,
            segment_elapsed_ms: 0,
            segment_size: 0.0,
            file_path_base: String::new(),
            file_error: String::new(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        const CTX: &str = "recording trial descriptor";
        Ok(Self {
            header: PropertyHeader::decode(data)?,
            locked: read_u32_le(data, 4, CTX)?,
            change_count: read_u32_le(data, 8, CTX)?,
            format: read_u32_le(data, 12, CTX)?,
            auto_stop_time: read_u32_le(data, 16, CTX)?,
            auto_segment_enabled: read_u32_le(data, 20, CTX)?,
            auto_segment_size: read_f32_le(data, 24, CTX)?,
            auto_segment_units: read_i32_le(data, 28, CTX)?,
            auto_increment_enabled: read_u32_le(data, 32, CTX)?,
            auto_increment_number: read_u32_le(data, 36, CTX)?,
            ext_info_block: read_u16_le(data, 40, CTX)?,
            file_names_block: read_u16_le(data, 42, CTX)?,
            prev_paths_block: read_u16_le(data, 44, CTX)?,
            sig_selection_block: read_u16_le(data, 46, CTX)?,
            dig_trigger_block: read_u16_le(data, 48, CTX)?,
            status: TrialStatus::from_raw(read_u32_le(data, 50, CTX)?),
            data_rate: read_f32_le(data, 54, CTX)?,
            remaining_disk_mb: read_f32_le(data, 58, CTX)?,
            trial_start: read_u32_le(data, 62, CTX)?,
            trial_pause: read_u32_le(data, 66, CTX)?,
            trial_stop: read_u32_le(data, 70, CTX)?,
            trial_elapsed_ms: read_u32_le(data, 74, CTX)?,
            trial_size: read_f32_le(data, 78, CTX)?,
            segment_count: read_u32_le(data, 82, CTX)?,
            segment_start: read_u32_le(data, 86, CTX)?,
            segment_pause: read_u32_le(data, 90, CTX)?,
            segment_stop: read_u32_le(data, 94, CTX)?,
            segment_elapsed_ms: read_u32_le(data, 98, CTX)?,
            segment_size: read_f32_le(data, 102, CTX)?,
            file_path_base: read_fixed_str(data, 106, Self::FILE_PATH_LEN, CTX)?,
            file_error: read_fixed_str(data, 618, Self::FILE_ERROR_LEN, CTX)?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_u32_le(buf, self.locked);
        put_u32_le(buf, self.change_count);
        put_u32_le(buf, self.format);
        put_u32_le(buf, self.auto_stop_time);
        put_u32_le(buf, self.auto_segment_enabled);
        put_f32_le(buf, self.auto_segment_size);
        put_i32_le(buf, self.auto_segment_units);
        put_u32_le(buf, self.auto_increment_enabled);
        put_u32_le(buf, self.auto_increment_number);
        put_u16_le(buf, self.ext_info_block);
        put_u16_le(buf, self.file_names_block);
        put_u16_le(buf, self.prev_paths_block);
        put_u16_le(buf, self.sig_selection_block);
        put_u16_le(buf, self.dig_trigger_block);
        put_u32_le(buf, self.status.to_raw());
        put_f32_le(buf, self.data_rate);
        put_f32_le(buf, self.remaining_disk_mb);
        put_u32_le(buf, self.trial_start);
        put_u32_le(buf, self.trial_pause);
        put_u32_le(buf, self.trial_stop);
        put_u32_le(buf, self.trial_elapsed_ms);
        put_f32_le(buf, self.trial_size);
        put_u32_le(buf, self.segment_count);
        put_u32_le(buf, self.segment_start);
        put_u32_le(buf, self.segment_pause);
        put_u32_le(buf, self.segment_stop);
        put_u32_le(buf, self.segment_elapsed_ms);
        put_f32_le(buf, self.segment_size);
        put_fixed_str(buf, &self.file_path_base, Self::FILE_PATH_LEN);
        put_fixed_str(buf, &self.file_error, Self::FILE_ERROR_LEN);
    }

    /// Aggregate trial size in megabytes.
    pub fn trial_size_mb(&self) -> f32 {
        self.trial_size / 1_000_000.0
    }
}

/// Digital input pattern watched by the Grapevine digital I/O front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalTriggerDescriptor {
    pub header: PropertyHeader,
    /// None=0, SMA1..SMA4=1..4, parallel=5
    pub input_channel: u16,
    /// hi-lo=0, lo-hi=1
    pub sma_transition: u16,
    pub parallel_mask: u16,
    pub parallel_compare: u16,
}

impl DigitalTriggerDescriptor {
    pub const ENCODED_LEN: usize = 12;

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            header: PropertyHeader::decode(data)?,
            input_channel: read_u16_le(data, 4, "digital trigger")?,
            sma_transition: read_u16_le(data, 6, "digital trigger")?,
            parallel_mask: read_u16_le(data, 8, "digital trigger")?,
            parallel_compare: read_u16_le(data, 10, "digital trigger")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_u16_le(buf, self.input_channel);
        put_u16_le(buf, self.sma_transition);
        put_u16_le(buf, self.parallel_mask);
        put_u16_le(buf, self.parallel_compare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_raw_values() {
        for raw in 1..=7 {
            let status = TrialStatus::from_raw(raw);
            assert!(!matches!(status, TrialStatus::Unknown(_)));
            assert_eq!(status.to_raw(), raw);
        }
        assert_eq!(TrialStatus::from_raw(0), TrialStatus::Unknown(0));
        assert_eq!(TrialStatus::from_raw(42).to_raw(), 42);
        assert!(TrialStatus::PauseRequested.is_transitional());
        assert!(!TrialStatus::Paused.is_transitional());
        assert_eq!(TrialStatus::StartRequested.to_string(), "STARTING...");
    }

    #[test]
    fn trial_descriptor_offsets() {
        let mut trial = RecordingTrialDescriptor::stopped(9, 10, 12);
        trial.status = TrialStatus::Recording;
        trial.trial_size = 2_500_000.0;
        trial.file_path_base = "/data/session".to_string();
        trial.file_error = "disk full".to_string();

        let mut buf = Vec::new();
        trial.encode_into(&mut buf);
        assert_eq!(buf.len(), RecordingTrialDescriptor::ENCODED_LEN);
        assert_eq!(&buf[40..42], &9u16.to_le_bytes());
        assert_eq!(&buf[42..44], &10u16.to_le_bytes());
        assert_eq!(&buf[46..48], &12u16.to_le_bytes());
        assert_eq!(&buf[50..54], &2u32.to_le_bytes());
        assert_eq!(&buf[106..119], b"/data/session");
        assert_eq!(&buf[618..627], b"disk full");

        let decoded = RecordingTrialDescriptor::decode(&buf).unwrap();
        assert_eq!(decoded, trial);
        assert!((decoded.trial_size_mb() - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn truncated_trial_descriptor_is_rejected() {
        let trial = RecordingTrialDescriptor::stopped(9, 10, 12);
        let mut buf = Vec::new();
        trial.encode_into(&mut buf);
        buf.truncate(700);
        assert!(RecordingTrialDescriptor::decode(&buf).is_err());
    }

    #[test]
    fn operator_descriptor_layout() {
        let op = OperatorProcessDescriptor {
            header: PropertyHeader::new(property_type::OPERATOR_DESCRIPTOR),
            property_count: 3,
            schema: SchemaVersion { major: 3, minor: 0 },
            vendor: "Ripple".to_string(),
            label: "Trellis".to_string(),
            version: "1.8.3".to_string(),
        };
        let mut buf = Vec::new();
        op.encode_into(&mut buf);
        assert_eq!(buf.len(), OperatorProcessDescriptor::ENCODED_LEN);
        assert_eq!(buf[6], 3);
        assert_eq!(&buf[24..31], b"Trellis");
        assert_eq!(OperatorProcessDescriptor::decode(&buf).unwrap(), op);
        assert_eq!(op.schema.to_string(), "3.0");
    }

    #[test]
    fn digital_trigger_layout() {
        let trig = DigitalTriggerDescriptor {
            header: PropertyHeader::new(property_type::DIGITAL_TRIGGER),
            input_channel: 5,
            sma_transition: 1,
            parallel_mask: 0x00FF,
            parallel_compare: 0x0042,
        };
        let mut buf = Vec::new();
        trig.encode_into(&mut buf);
        assert_eq!(buf.len(), DigitalTriggerDescriptor::ENCODED_LEN);
        assert_eq!(DigitalTriggerDescriptor::decode(&buf).unwrap(), trig);
    }
}
