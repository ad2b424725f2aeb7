//! Well-known identifiers and constants of the instrument network
//!
//! Values are fixed by convention on the network rather than discovered.

// Network deployment constants
pub mod net {
    pub const INSTRUMENT_BROADCAST_ADDR: &str = "192.168.42.255";
    pub const INSTRUMENT_BASE_ADDR: &str = "192.168.42.1";
    pub const DACAR_PORT: u16 = 2046; // data and config acknowledgement
    pub const CRR_PORT: u16 = 2047; // config request
    pub const MAX_UDP_PACKET_SIZE: usize = 1400; // outgoing, leaves room for the Ethernet header
    pub const UDP_BUFFER_BYTES: usize = 1500;
}

// Header field values
pub mod processor {
    pub const ROOT: u8 = 0; // PC or anonymous source
    pub const MASTER: u8 = 1;
    pub const HARDWARE_MAX: u8 = 16;
    pub const OPERATOR_MIN: u8 = 128; // config frames from >= 128 come from an Operator
    pub const ALL: u8 = 255;
}

pub mod module {
    pub const PROCESSOR: u8 = 0;
    pub const OPERATOR_PROCESS_MAIN: u8 = 0;
    pub const ALL: u8 = 255;
}

pub mod stream {
    pub const CONFIG: u8 = 0;
}

// Operator property identifiers
pub mod property_id {
    pub const OPERATOR_PROCESS_DESCRIPTOR: u16 = 0;
    pub const OPERATOR_RECORDING_TRIAL_LIST: u16 = 1;
    pub const RECORDING_TRIAL_DESCRIPTOR: u16 = 0x7FFF; // first trial, used before the real ID is known
    pub const ALL: u16 = 65535;
}

// Offsets of trial properties relative to the trial descriptor
pub mod trial_offset {
    pub const DESCRIPTOR: u16 = 0;
    pub const OVERRUN_COUNT: u16 = 1;
    pub const DATA_GAP_COUNT: u16 = 2;
    pub const DATA_SOURCE_ERROR_COUNT: u16 = 3;
    pub const REMOTE_SYNC_DESCRIPTOR: u16 = 4;
    pub const PLAY_TONE_ON_CHANGE: u16 = 5;
    pub const REMOTE_CONTROL_ENABLED: u16 = 6;
    pub const DIGITAL_TRIGGER_ENABLED: u16 = 7;
    pub const SAVE_INSTRUMENT_CONFIG: u16 = 8;
    pub const EXT_INFO_BLOCK: u16 = 9; // 4 extended info props
    pub const FILE_NAMES_BLOCK: u16 = 10; // 16 file name props
    pub const PREV_PATHS_BLOCK: u16 = 11; // 128 previous path props
    pub const SIG_SELECT_BLOCK: u16 = 12; // 16 signal selection props
    pub const DIGITAL_TRIG_BLOCK: u16 = 13; // 4 trigger props
}

// Property type tags
pub mod property_type {
    pub const BOOL: u8 = 3;
    pub const INT: u8 = 4;
    pub const STRING: u8 = 6;
    pub const PROPERTY_BLOCK: u8 = 19;
    pub const OPERATOR_DESCRIPTOR: u8 = 20;
    pub const RECORDING_TRIAL_DESCRIPTOR: u8 = 21;
    pub const SIGNAL_SELECTION_DESCRIPTOR: u8 = 22;
    pub const DIGITAL_TRIGGER: u8 = 128;
    pub const RECORDING_SYNC_CMD: u8 = 129;
    pub const REMOTE_REC_SYNC_CONFIG: u8 = 130;
    pub const FE_SIGNAL_SELECTION: u8 = 131;
    pub const RECORDING_SYNC_HEARTBEAT: u8 = 132;
    pub const UNSPECIFIED: u8 = 255;
}

// Data stream type field values
pub mod stream_type {
    pub const UNDEFINED: u16 = 0x00;
    pub const CONTINUOUS: u16 = 0x01;
    pub const SEGMENT: u16 = 0x02;
    pub const DIGEST: u16 = 0x04;
    pub const LEGACY_DIGITAL: u16 = 0x06;
}

// Signal types named in front-end selections
pub mod signal_type {
    pub const SPIKE: u32 = 1;
    pub const DIGITAL: u32 = 2;
    pub const CONTINUOUS_LFP: u32 = 3;
    pub const CONTINUOUS_RAW: u32 = 4;
    pub const CONTINUOUS_ANALOG: u32 = 5;
}

pub mod schema {
    pub const VERSION_MAJOR: u8 = 3; // non binary compatible changes
    pub const VERSION_MINOR: u8 = 0; // binary compatible changes
}

pub mod recording_format {
    pub const NEV2PT2: u32 = 0;
}

pub const STRLEN_LABEL: usize = 128;
