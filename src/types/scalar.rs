//! Scalar properties: bool, bounded int, and length-prefixed string

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

use super::header::PropertyHeader;
use super::xipp_ids::property_type;
use crate::Result;
use crate::wire::bytes::{
    put_i32_le, put_u16_le, read_bytes, read_i32_le, read_u16_le, read_u8, truncate_to_boundary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolProperty {
    pub header: PropertyHeader,
    pub value: bool,
    pub default: bool,
}

impl BoolProperty {
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            header: PropertyHeader::decode(data)?,
            value: read_u8(data, 4, "bool property")? != 0,
            default: read_u8(data, 5, "bool property")? != 0,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        buf.push(self.value as u8);
        buf.push(self.default as u8);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntProperty {
    pub header: PropertyHeader,
    pub value: i32,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

impl IntProperty {
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            header: PropertyHeader::decode(data)?,
            value: read_i32_le(data, 4, "int property")?,
            min: read_i32_le(data, 8, "int property")?,
            max: read_i32_le(data, 12, "int property")?,
            default: read_i32_le(data, 16, "int property")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_i32_le(buf, self.value);
        put_i32_le(buf, self.min);
        put_i32_le(buf, self.max);
        put_i32_le(buf, self.default);
    }

    pub fn in_bounds(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// String property with a fixed capacity of `max_length` bytes.
///
/// The wire `length` field is always derived from `value`, so the two can
/// never disagree after an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringProperty {
    pub header: PropertyHeader,
    pub max_length: u16,
    value: String,
}

impl StringProperty {
    pub fn new(max_length: u16, value: &str) -> Self {
        let mut property = Self {
            header: PropertyHeader::new(property_type::STRING),
            max_length,
            value: String::new(),
        };
        property.set_value(value);
        property
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PropertyHeader::decode(data)?;
        let max_length = read_u16_le(data, 4, "string property")?;
        let length = read_u16_le(data, 6, "string property")?;

        // A reply may carry fewer bytes than `length` claims; never read past either bound.
        let available = data.len().saturating_sub(8);
        let len = (length as usize).min(max_length as usize).min(available);
        let raw = read_bytes(data, 8, len, "string property")?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());

        let mut property = Self { header, max_length, value: String::new() };
        match String::from_utf8_lossy(&raw[..end]) {
            Cow::Borrowed(text) => property.value = text.to_string(),
            Cow::Owned(text) => {
                debug!(
                    max_length,
                    raw = ?&raw[..end],
                    "String property is not valid UTF-8, replacing invalid bytes"
                );
                // replacement characters are wider than the bytes they stand for
                property.set_value(&text);
            }
        }
        Ok(property)
    }

    /// Encodes `length` value bytes, plus a terminating NUL when there is room for one.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_u16_le(buf, self.max_length);
        put_u16_le(buf, self.length());
        buf.extend_from_slice(self.value.as_bytes());
        if self.value.len() < self.max_length as usize {
            buf.push(0);
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn length(&self) -> u16 {
        self.value.len() as u16
    }

    /// Replace the value, truncating to `max_length` bytes. Returns `true` if truncated.
    pub fn set_value(&mut self, text: &str) -> bool {
        let kept = truncate_to_boundary(text, self.max_length as usize);
        self.value = kept.to_string();
        kept.len() < text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn int_property_layout() {
        let prop = IntProperty {
            header: PropertyHeader::new(property_type::INT),
            value: -5,
            min: -10,
            max: 10,
            default: 0,
        };
        let mut buf = Vec::new();
        prop.encode_into(&mut buf);
        assert_eq!(buf.len(), 20);
        assert_eq!(buf[1], property_type::INT);
        assert_eq!(IntProperty::decode(&buf).unwrap(), prop);
        assert!(prop.in_bounds(10));
        assert!(!prop.in_bounds(11));
    }

    #[test]
    fn bool_property_layout() {
        let prop = BoolProperty {
            header: PropertyHeader::new(property_type::BOOL),
            value: true,
            default: false,
        };
        let mut buf = Vec::new();
        prop.encode_into(&mut buf);
        assert_eq!(buf, vec![0, 3, 0, 0, 1, 0]);
        assert_eq!(BoolProperty::decode(&buf).unwrap(), prop);
    }

    #[test]
    fn string_decode_honours_length_and_capacity() {
        let mut buf = vec![0, property_type::STRING, 0, 0];
        buf.extend_from_slice(&8u16.to_le_bytes());
        buf.extend_from_slice(&5u16.to_le_bytes());
        buf.extend_from_slice(b"trial-one");
        let prop = StringProperty::decode(&buf).unwrap();
        assert_eq!(prop.value(), "trial");
        assert_eq!(prop.length(), 5);

        // length larger than the bytes actually present
        let mut short = vec![0, property_type::STRING, 0, 0];
        short.extend_from_slice(&64u16.to_le_bytes());
        short.extend_from_slice(&40u16.to_le_bytes());
        short.extend_from_slice(b"abc");
        assert_eq!(StringProperty::decode(&short).unwrap().value(), "abc");
    }

    #[test]
    fn invalid_utf8_is_replaced_within_capacity() {
        let mut buf = vec![0, property_type::STRING, 0, 0];
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&[b'a', 0xFF, 0xFE, b'b']);
        let prop = StringProperty::decode(&buf).unwrap();
        assert!(prop.value().starts_with("a\u{FFFD}"));
        assert!(prop.length() <= 4);

        let mut wire = Vec::new();
        prop.encode_into(&mut wire);
        assert!(wire.len() <= 8 + 4);
    }

    #[test]
    fn full_string_has_no_terminator() {
        let prop = StringProperty::new(4, "abcdef");
        assert_eq!(prop.value(), "abcd");
        let mut buf = Vec::new();
        prop.encode_into(&mut buf);
        assert_eq!(buf.len(), 8 + 4);
        assert_eq!(&buf[6..8], &4u16.to_le_bytes());
    }

    proptest! {
        #[test]
        fn set_value_never_exceeds_capacity(max_length in 0u16..64, text in "[a-zA-Z0-9 .éü漢]{0,80}") {
            let mut prop = StringProperty::new(max_length, "");
            let truncated = prop.set_value(&text);
            prop_assert!(prop.value().len() <= max_length as usize);
            prop_assert_eq!(prop.length() as usize, prop.value().len());
            prop_assert!(text.starts_with(prop.value()));
            prop_assert_eq!(truncated, prop.value().len() < text.len());

            let mut buf = Vec::new();
            prop.encode_into(&mut buf);
            prop_assert!(buf.len() <= 8 + max_length as usize + 1);
            let decoded = StringProperty::decode(&buf).unwrap();
            prop_assert_eq!(decoded.value(), prop.value());
        }
    }
}
