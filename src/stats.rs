//! Network traffic counters
//!
//! Every received datagram and frame is classified here, whether or not the
//! session consumes it. Data frames are broken down by their stream type.

use serde::{Deserialize, Serialize};

use crate::types::{DataFrameKind, time_after_u32};
use crate::wire::Frame;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub datagrams: u64,
    pub bytes: u64,
    pub frames: u64,
    pub config_frames: u64,
    pub data_frames: u64,
    /// Datagrams whose remainder was dropped after a truncated frame.
    pub truncated_datagrams: u64,
    pub continuous_frames: u64,
    pub segment_frames: u64,
    pub digest_frames: u64,
    pub legacy_digital_frames: u64,
    pub other_data_frames: u64,
    /// Newest sample-clock timestamp seen, compared with wraparound.
    pub latest_time: Option<u32>,
}

impl NetworkStats {
    pub fn record_datagram(&mut self, len: usize) {
        self.datagrams += 1;
        self.bytes += len as u64;
    }

    pub fn record_truncated(&mut self) {
        self.truncated_datagrams += 1;
    }

    pub fn record_frame(&mut self, frame: &Frame<'_>) {
        self.frames += 1;
        let time = frame.header().time;
        match self.latest_time {
            Some(latest) if !time_after_u32(time, latest) => {}
            _ => self.latest_time = Some(time),
        }

        if frame.is_config() {
            self.config_frames += 1;
            return;
        }

        self.data_frames += 1;
        let kind = frame.as_data().and_then(|data| data.kind().ok());
        match kind {
            Some(DataFrameKind::Continuous) => self.continuous_frames += 1,
            Some(DataFrameKind::Segment) => self.segment_frames += 1,
            Some(DataFrameKind::Digest) => self.digest_frames += 1,
            Some(DataFrameKind::LegacyDigital) => self.legacy_digital_frames += 1,
            Some(DataFrameKind::Undefined | DataFrameKind::Other(_)) | None => {
                self.other_data_frames += 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfigTarget;
    use crate::types::xipp_ids::stream_type;
    use crate::wire::{ConfigFrame, encode_frame, frames};

    #[test]
    fn classifies_config_and_data_frames() {
        let mut datagram = ConfigFrame::query(ConfigTarget::new(255, 0, 0)).encode().unwrap();
        datagram.extend(
            encode_frame(1, 2, 3, 10, &[stream_type::CONTINUOUS as u8, 0, 0, 0, 1, 2]).unwrap(),
        );
        datagram.extend(encode_frame(1, 2, 4, 12, &[stream_type::SEGMENT as u8, 0, 0, 0]).unwrap());
        datagram.extend(encode_frame(1, 2, 5, 11, &[9, 0, 0, 0]).unwrap());

        let mut stats = NetworkStats::default();
        stats.record_datagram(datagram.len());
        for frame in frames(&datagram) {
            stats.record_frame(&frame.unwrap());
        }

        assert_eq!(stats.datagrams, 1);
        assert_eq!(stats.bytes, datagram.len() as u64);
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.config_frames, 1);
        assert_eq!(stats.data_frames, 3);
        assert_eq!(stats.continuous_frames, 1);
        assert_eq!(stats.segment_frames, 1);
        assert_eq!(stats.other_data_frames, 1);
        assert_eq!(stats.latest_time, Some(12));
    }

    #[test]
    fn latest_time_survives_wraparound() {
        let mut stats = NetworkStats::default();
        for time in [u32::MAX - 1, u32::MAX, 3, 1] {
            let datagram = encode_frame(1, 1, 1, time, &[1, 0, 0, 0]).unwrap();
            for frame in frames(&datagram) {
                stats.record_frame(&frame.unwrap());
            }
        }
        assert_eq!(stats.latest_time, Some(3));
    }
}
