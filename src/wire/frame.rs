//! Frame codec
//!
//! A datagram carries one or more frames packed back to back. Each frame's
//! length comes only from its header `size` field (`8 + 4 * size` bytes), never
//! from the datagram boundary.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::bytes::read_u16_le;
use super::property::Property;
use crate::types::{ConfigTarget, DataFrameKind, FrameHeader, SegmentInfo};
use crate::{Result, XippError};

/// Largest payload a single frame can describe.
pub const MAX_PAYLOAD_BYTES: usize = 255 * 4;

/// Borrowed view of one frame inside a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    header: FrameHeader,
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// The complete frame, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[FrameHeader::LEN..]
    }

    pub fn is_config(&self) -> bool {
        self.header.is_config()
    }

    /// Copy out a configuration frame.
    pub fn to_config(&self) -> Result<ConfigFrame> {
        if !self.is_config() {
            return Err(XippError::parse(
                "config frame",
                format!("stream {} is a data stream", self.header.stream),
            ));
        }
        let payload = self.payload();
        let target = ConfigTarget::decode(payload)?;
        Ok(ConfigFrame {
            header: self.header,
            target,
            payload: payload[ConfigTarget::LEN..].to_vec(),
        })
    }

    pub fn as_data(&self) -> Option<DataFrame<'a>> {
        (!self.is_config()).then_some(DataFrame { header: self.header, payload: self.payload() })
    }
}

/// Lazy iterator over the frames of one datagram.
///
/// Yields `Err(TruncatedFrame)` once if a frame overruns the datagram and then
/// stops; the remainder of that datagram is unusable.
#[derive(Debug, Clone)]
pub struct FrameIter<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

pub fn frames(datagram: &[u8]) -> FrameIter<'_> {
    FrameIter { buf: datagram, offset: 0, done: false }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }

        let available = self.buf.len() - self.offset;
        let rest = &self.buf[self.offset..];
        let frame_len = match FrameHeader::decode(rest) {
            Ok(header) => header.frame_len(),
            Err(_) => FrameHeader::LEN,
        };

        if frame_len > available {
            self.done = true;
            return Some(Err(XippError::TruncatedFrame {
                offset: self.offset,
                frame_len,
                available,
            }));
        }

        let bytes = &rest[..frame_len];
        let result = FrameHeader::decode(bytes).map(|header| Frame { header, bytes });
        trace!("Frame at offset {}: {} bytes", self.offset, frame_len);
        self.offset += frame_len;
        Some(result)
    }
}

/// Encode one frame, padding the payload to a quadlet boundary.
pub fn encode_frame(
    processor: u8,
    module: u8,
    stream: u8,
    time: u32,
    payload: &[u8],
) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(XippError::PayloadTooLarge { bytes: payload.len(), max: MAX_PAYLOAD_BYTES });
    }
    let quadlets = payload.len().div_ceil(4);
    let header = FrameHeader { size: quadlets as u8, processor, module, stream, time };

    let mut buf = Vec::with_capacity(header.frame_len());
    header.encode_into(&mut buf);
    buf.extend_from_slice(payload);
    buf.resize(header.frame_len(), 0);
    Ok(buf)
}

/// Owned configuration frame: source header, target, and property payload.
///
/// An empty payload is a query for the target property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFrame {
    pub header: FrameHeader,
    pub target: ConfigTarget,
    pub payload: Vec<u8>,
}

impl ConfigFrame {
    /// Anonymous read request for `target`.
    pub fn query(target: ConfigTarget) -> Self {
        Self { header: FrameHeader::default(), target, payload: Vec::new() }
    }

    /// Anonymous write of `property` to `target`.
    pub fn write(target: ConfigTarget, property: &Property) -> Self {
        Self { header: FrameHeader::default(), target, payload: property.encode() }
    }

    pub fn is_query(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decode the carried property; `None` for a query.
    pub fn property(&self) -> Result<Option<Property>> {
        if self.is_query() {
            return Ok(None);
        }
        Property::decode(&self.payload).map(Some)
    }

    /// Source processor of the frame.
    pub fn source(&self) -> u8 {
        self.header.processor
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(ConfigTarget::LEN + self.payload.len());
        self.target.encode_into(&mut body);
        body.extend_from_slice(&self.payload);
        encode_frame(self.header.processor, self.header.module, 0, self.header.time, &body)
    }
}

/// Borrowed view of a data-stream frame.
#[derive(Debug, Clone, Copy)]
pub struct DataFrame<'a> {
    header: FrameHeader,
    payload: &'a [u8],
}

impl<'a> DataFrame<'a> {
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn kind(&self) -> Result<DataFrameKind> {
        read_u16_le(self.payload, 0, "data frame").map(DataFrameKind::from_raw)
    }

    /// Running counter used to detect drops on spike streams.
    pub fn count(&self) -> Result<u16> {
        read_u16_le(self.payload, 2, "data frame")
    }

    pub fn segment(&self) -> Result<Option<SegmentInfo>> {
        if self.kind()? != DataFrameKind::Segment {
            return Ok(None);
        }
        Ok(Some(SegmentInfo {
            class_id: read_u16_le(self.payload, 4, "segment frame")?,
            sample_count: read_u16_le(self.payload, 6, "segment frame")?,
        }))
    }

    /// Samples that follow the stream-type fields, as raw little-endian bytes.
    pub fn samples(&self) -> &'a [u8] {
        let skip = match self.kind() {
            Ok(DataFrameKind::Segment) => 8,
            _ => 4,
        };
        self.payload.get(skip..).unwrap_or(&[])
    }

    pub fn module(&self) -> u8 {
        self.header.module
    }

    pub fn stream(&self) -> u8 {
        self.header.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StringProperty;
    use crate::types::xipp_ids::property_id;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn encoded_frames_decode_to_the_same_header(
            processor in any::<u8>(),
            module in any::<u8>(),
            stream in any::<u8>(),
            time in any::<u32>(),
            payload in prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_BYTES),
        ) {
            let bytes = encode_frame(processor, module, stream, time, &payload).unwrap();
            prop_assert_eq!(bytes.len() % 4, 0);
            prop_assert_eq!(bytes.len(), 8 + payload.len().div_ceil(4) * 4);

            let decoded: Vec<_> = frames(&bytes).collect::<Result<_>>().unwrap();
            prop_assert_eq!(decoded.len(), 1);
            let header = decoded[0].header();
            prop_assert_eq!(header.processor, processor);
            prop_assert_eq!(header.module, module);
            prop_assert_eq!(header.stream, stream);
            prop_assert_eq!(header.time, time);
            prop_assert_eq!(&decoded[0].payload()[..payload.len()], &payload[..]);
        }

        #[test]
        fn splitting_never_panics(datagram in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut consumed = 0;
            for frame in frames(&datagram) {
                match frame {
                    Ok(frame) => consumed += frame.as_bytes().len(),
                    Err(XippError::TruncatedFrame { offset, .. }) => prop_assert_eq!(offset, consumed),
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
            }
            prop_assert!(consumed <= datagram.len());
        }
    }

    #[test]
    fn datagram_splits_into_frames() {
        let mut datagram = encode_frame(1, 2, 1, 100, &[1, 0, 0, 0, 5, 6]).unwrap();
        datagram.extend(encode_frame(130, 0, 0, 200, &[]).unwrap());
        datagram.extend(encode_frame(1, 4, 7, 300, &[2, 0, 9, 0, 0, 0, 52, 0]).unwrap());

        let frames: Vec<_> = frames(&datagram).collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].as_bytes().len(), 16);
        assert_eq!(frames[1].as_bytes().len(), 8);
        assert!(frames[1].is_config());

        let data = frames[2].as_data().unwrap();
        assert_eq!(data.kind().unwrap(), DataFrameKind::Segment);
        assert_eq!(data.count().unwrap(), 9);
        assert_eq!(data.segment().unwrap(), Some(SegmentInfo { class_id: 0, sample_count: 52 }));
        assert!(data.samples().is_empty());
    }

    #[test]
    fn truncated_frame_stops_iteration() {
        let mut datagram = encode_frame(1, 1, 1, 0, &[1, 0, 0, 0]).unwrap();
        let mut second = encode_frame(1, 1, 1, 0, &[0u8; 16]).unwrap();
        second.truncate(12);
        datagram.extend(second);
        datagram.extend(encode_frame(1, 1, 1, 0, &[]).unwrap());

        let mut iter = frames(&datagram);
        assert!(iter.next().unwrap().is_ok());
        match iter.next().unwrap() {
            Err(XippError::TruncatedFrame { offset, frame_len, available }) => {
                assert_eq!(offset, 12);
                assert_eq!(frame_len, 24);
                assert_eq!(available, 20);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn trailing_partial_header_is_truncation() {
        let mut datagram = encode_frame(1, 1, 1, 0, &[]).unwrap();
        datagram.extend_from_slice(&[1, 2, 3]);
        let results: Vec<_> = frames(&datagram).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(XippError::TruncatedFrame { offset: 8, frame_len: 8, available: 3 })));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = encode_frame(0, 0, 0, 0, &[0u8; MAX_PAYLOAD_BYTES + 1]).unwrap_err();
        assert!(matches!(err, XippError::PayloadTooLarge { bytes: 1021, max: 1020 }));
    }

    #[test]
    fn config_frame_round_trip() {
        let target = ConfigTarget::new(130, 0, 204);
        let write = ConfigFrame::write(target, &Property::String(StringProperty::new(32, "hello")));
        let bytes = write.encode().unwrap();

        let frame = frames(&bytes).next().unwrap().unwrap();
        let decoded = frame.to_config().unwrap();
        assert_eq!(decoded.target, target);
        assert_eq!(decoded.property().unwrap(), write.property().unwrap());

        let query = ConfigFrame::query(ConfigTarget::new(255, 0, property_id::OPERATOR_PROCESS_DESCRIPTOR));
        let bytes = query.encode().unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0, 0, 0, 0, 0, 255, 0, 0, 0]);
        let decoded = frames(&bytes).next().unwrap().unwrap().to_config().unwrap();
        assert!(decoded.is_query());
        assert_eq!(decoded.property().unwrap(), None);
    }

    #[test]
    fn data_frames_are_not_config() {
        let bytes = encode_frame(1, 1, 3, 0, &[1, 0, 0, 0]).unwrap();
        let frame = frames(&bytes).next().unwrap().unwrap();
        assert!(frame.to_config().is_err());
        assert_eq!(frame.as_data().unwrap().kind().unwrap(), DataFrameKind::Continuous);
    }
}
