//! Tagged-union decode of property payloads
//!
//! The property header's type tag is read once and the payload decoded into the
//! matching variant. Tags this library does not model are kept as raw bytes so
//! that they can still be logged or echoed back.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Result;
use crate::types::xipp_ids::property_type;
use crate::types::{
    BoolProperty, DigitalTriggerDescriptor, FrontEndSelection, IntProperty,
    OperatorProcessDescriptor, PropertyBlock, PropertyHeader, RecordingTrialDescriptor,
    StringProperty,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Bool(BoolProperty),
    Int(IntProperty),
    String(StringProperty),
    Block(PropertyBlock),
    OperatorDescriptor(OperatorProcessDescriptor),
    RecordingTrial(RecordingTrialDescriptor),
    FrontEndSelection(FrontEndSelection),
    DigitalTrigger(DigitalTriggerDescriptor),
    Unknown { header: PropertyHeader, raw: Vec<u8> },
}

impl Property {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let header = PropertyHeader::decode(payload)?;
        trace!("Decoding property type {} ({} bytes)", header.type_tag, payload.len());

        let property = match header.type_tag {
            property_type::BOOL => Property::Bool(BoolProperty::decode(payload)?),
            property_type::INT => Property::Int(IntProperty::decode(payload)?),
            property_type::STRING => Property::String(StringProperty::decode(payload)?),
            property_type::PROPERTY_BLOCK => Property::Block(PropertyBlock::decode(payload)?),
            property_type::OPERATOR_DESCRIPTOR => {
                Property::OperatorDescriptor(OperatorProcessDescriptor::decode(payload)?)
            }
            property_type::RECORDING_TRIAL_DESCRIPTOR => {
                Property::RecordingTrial(RecordingTrialDescriptor::decode(payload)?)
            }
            property_type::FE_SIGNAL_SELECTION => {
                Property::FrontEndSelection(FrontEndSelection::decode(payload)?)
            }
            property_type::DIGITAL_TRIGGER => {
                Property::DigitalTrigger(DigitalTriggerDescriptor::decode(payload)?)
            }
            _ => Property::Unknown { header, raw: payload.to_vec() },
        };
        Ok(property)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Property::Bool(p) => p.encode_into(&mut buf),
            Property::Int(p) => p.encode_into(&mut buf),
            Property::String(p) => p.encode_into(&mut buf),
            Property::Block(p) => p.encode_into(&mut buf),
            Property::OperatorDescriptor(p) => p.encode_into(&mut buf),
            Property::RecordingTrial(p) => p.encode_into(&mut buf),
            Property::FrontEndSelection(p) => p.encode_into(&mut buf),
            Property::DigitalTrigger(p) => p.encode_into(&mut buf),
            Property::Unknown { raw, .. } => buf.extend_from_slice(raw),
        }
        buf
    }

    pub fn header(&self) -> PropertyHeader {
        match self {
            Property::Bool(p) => p.header,
            Property::Int(p) => p.header,
            Property::String(p) => p.header,
            Property::Block(p) => p.header,
            Property::OperatorDescriptor(p) => p.header,
            Property::RecordingTrial(p) => p.header,
            Property::FrontEndSelection(p) => p.header,
            Property::DigitalTrigger(p) => p.header,
            Property::Unknown { header, .. } => *header,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Property::Bool(_) => "bool",
            Property::Int(_) => "int",
            Property::String(_) => "string",
            Property::Block(_) => "property block",
            Property::OperatorDescriptor(_) => "operator descriptor",
            Property::RecordingTrial(_) => "recording trial descriptor",
            Property::FrontEndSelection(_) => "front end signal selection",
            Property::DigitalTrigger(_) => "digital trigger",
            Property::Unknown { .. } => "unknown",
        }
    }

    pub fn as_string(&self) -> Option<&StringProperty> {
        match self {
            Property::String(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_front_end_selection(&self) -> Option<&FrontEndSelection> {
        match self {
            Property::FrontEndSelection(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XippError;
    use crate::types::SignalSelectionSet;

    #[test]
    fn decode_dispatches_on_type_tag() {
        let cases = vec![
            Property::String(StringProperty::new(64, "trial comment")),
            Property::Block(PropertyBlock::new(300, 4, 6, "extended info")),
            Property::RecordingTrial(RecordingTrialDescriptor::stopped(9, 10, 12)),
            Property::FrontEndSelection(FrontEndSelection::new(
                1,
                1,
                1,
                'A',
                "micro",
                &[SignalSelectionSet::new(0x0102_0300, 32)],
            )),
        ];
        for property in cases {
            let decoded = Property::decode(&property.encode()).unwrap();
            assert_eq!(decoded.type_name(), property.type_name());
            assert_eq!(decoded, property);
        }
    }

    #[test]
    fn unknown_tag_keeps_raw_bytes() {
        let raw = vec![7, property_type::RECORDING_SYNC_HEARTBEAT, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];
        let property = Property::decode(&raw).unwrap();
        match &property {
            Property::Unknown { header, raw: kept } => {
                assert_eq!(header.vendor, 7);
                assert_eq!(kept, &raw);
            }
            other => panic!("expected unknown property, got {other:?}"),
        }
        assert_eq!(property.encode(), raw);
    }

    #[test]
    fn mismatched_payload_is_a_parse_error() {
        // Claims to be a trial descriptor but carries only a block's worth of bytes.
        let mut raw = PropertyBlock::new(1, 1, 0, "");
        raw.header.type_tag = property_type::RECORDING_TRIAL_DESCRIPTOR;
        let err = Property::decode(&Property::Block(raw).encode()).unwrap_err();
        assert!(matches!(err, XippError::Parse { .. }));
    }
}
