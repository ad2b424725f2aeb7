//! Frame, configuration target, and property headers

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::wire::bytes::{put_u16_le, put_u32_le, read_u16_le, read_u32_le, read_u8};

/// Header common to every frame on the instrument network.
///
/// ```text
/// size      u8   payload length in quadlets
/// processor u8   0 = PC/anonymous, 1-16 = hardware processor, >= 128 = Operator
/// module    u8   0 = processor level, 1-254 = functional unit
/// stream    u8   0 = configuration, 1-254 = data stream
/// time      u32  free-running sample clock, wraps at 2^32
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameHeader {
    pub size: u8,
    pub processor: u8,
    pub module: u8,
    pub stream: u8,
    pub time: u32,
}

impl FrameHeader {
    pub const LEN: usize = 8;

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            size: read_u8(data, 0, "frame header")?,
            processor: read_u8(data, 1, "frame header")?,
            module: read_u8(data, 2, "frame header")?,
            stream: read_u8(data, 3, "frame header")?,
            time: read_u32_le(data, 4, "frame header")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[self.size, self.processor, self.module, self.stream]);
        put_u32_le(buf, self.time);
    }

    /// Total length in bytes of the frame this header starts.
    pub fn frame_len(&self) -> usize {
        Self::LEN + 4 * self.size as usize
    }

    pub fn payload_len(&self) -> usize {
        4 * self.size as usize
    }

    pub fn is_config(&self) -> bool {
        self.stream == 0
    }
}

/// Names the property a configuration frame reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigTarget {
    pub processor: u8,
    pub module: u8,
    pub property: u16,
}

impl ConfigTarget {
    pub const LEN: usize = 4;

    pub fn new(processor: u8, module: u8, property: u16) -> Self {
        Self { processor, module, property }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            processor: read_u8(data, 0, "config target")?,
            module: read_u8(data, 1, "config target")?,
            property: read_u16_le(data, 2, "config target")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.processor);
        buf.push(self.module);
        put_u16_le(buf, self.property);
    }

    /// Same processor and module, different property.
    pub fn with_property(self, property: u16) -> Self {
        Self { property, ..self }
    }
}

/// Leading header of every property payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyHeader {
    pub vendor: u8,
    pub type_tag: u8,
    pub flags: u16,
}

impl PropertyHeader {
    pub const LEN: usize = 4;

    pub fn new(type_tag: u8) -> Self {
        Self { vendor: 0, type_tag, flags: 0 }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            vendor: read_u8(data, 0, "property header")?,
            type_tag: read_u8(data, 1, "property header")?,
            flags: read_u16_le(data, 2, "property header")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.vendor);
        buf.push(self.type_tag);
        put_u16_le(buf, self.flags);
    }
}
