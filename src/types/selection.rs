//! Signal selection bitmasks for front-end streams
//!
//! A signal GUID packs processor, module, stream, and signal into 32 bits:
//!
//! ```text
//! bits 31..8  stream address (module and stream ID in the low byte of this range)
//! bits  7..0  signal index for continuous streams, 0 for event streams
//! ```
//!
//! A [`SignalSelectionSet`] covers one stream type of one front end. Continuous
//! sets name a single stream whose signals are indexed by the low byte. Event
//! sets name the first of a run of up to 32 consecutive streams, one per signal,
//! and are marked by a nonzero low byte in the set GUID.

use serde::{Deserialize, Serialize};

use super::bitfield::BitField;
use super::header::PropertyHeader;
use super::xipp_ids::{STRLEN_LABEL, property_type};
use crate::Result;
use crate::wire::bytes::{put_fixed_str, put_u32_le, read_fixed_str, read_u32_le, read_u8};

/// Maximum number of signals addressable by one selection bitmask.
pub const MAX_SIGNALS_PER_SET: u32 = 32;

/// Number of selection sets carried by a front-end selection descriptor.
pub const SIGNAL_TYPE_SLOTS: usize = 32;

const STREAM_MASK: u32 = 0xFFFF_FF00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalSelectionSet {
    pub guid: u32,
    pub count: u32,
    pub selections: BitField,
}

impl SignalSelectionSet {
    pub const ENCODED_LEN: usize = 12;

    pub fn new(guid: u32, count: u32) -> Self {
        Self { guid, count, selections: BitField::new(0) }
    }

    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        Ok(Self {
            guid: read_u32_le(data, offset, "signal selection set")?,
            count: read_u32_le(data, offset + 4, "signal selection set")?,
            selections: BitField::new(read_u32_le(data, offset + 8, "signal selection set")?),
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u32_le(buf, self.guid);
        put_u32_le(buf, self.count);
        put_u32_le(buf, self.selections.value());
    }

    /// Event sets carry a nonzero low byte in their GUID.
    pub fn is_event(&self) -> bool {
        self.guid & 0xFF != 0
    }

    /// Stream ID of the continuous stream, or of the first event stream.
    pub fn first_stream_id(&self) -> u8 {
        ((self.guid & 0xFF00) >> 8) as u8
    }

    fn stream_address(guid: u32) -> u32 {
        (guid & STREAM_MASK) >> 8
    }

    /// Signals addressable by this set, capped at the bitmask width.
    fn signal_count(&self) -> u32 {
        self.count.min(MAX_SIGNALS_PER_SET)
    }

    /// GUID of the signal at `index`, if the set has that many signals.
    pub fn signal_guid_at(&self, index: u32) -> Option<u32> {
        if index >= self.signal_count() {
            return None;
        }
        let base = self.guid & STREAM_MASK;
        Some(if self.is_event() { base.wrapping_add(index << 8) } else { base | index })
    }

    pub fn has_signal(&self, guid: u32) -> bool {
        let signal_stream = Self::stream_address(guid);
        let this_stream = Self::stream_address(self.guid);
        if self.is_event() {
            signal_stream >= this_stream && signal_stream - this_stream < self.count
        } else {
            signal_stream == this_stream
        }
    }

    /// Bit position of `guid` in the selection mask.
    fn bit_index(&self, guid: u32) -> Option<u32> {
        if !self.has_signal(guid) {
            return None;
        }
        let index = if self.is_event() {
            Self::stream_address(guid) - Self::stream_address(self.guid)
        } else {
            guid & 0xFF
        };
        (index < MAX_SIGNALS_PER_SET).then_some(index)
    }

    pub fn is_selected(&self, guid: u32) -> bool {
        self.bit_index(guid).is_some_and(|bit| self.selections.is_set(bit))
    }

    /// Returns `false` without changing anything when the signal is not in this set.
    pub fn set_selection(&mut self, guid: u32, selected: bool) -> bool {
        let Some(bit) = self.bit_index(guid) else {
            return false;
        };
        let mask = 1u32 << bit;
        let value = self.selections.value();
        self.selections = BitField::new(if selected { value | mask } else { value & !mask });
        true
    }

    /// Replace the whole bitmask when `stream_guid` belongs to this set.
    pub fn set_selections(&mut self, stream_guid: u32, bitmask: u32) -> bool {
        if !self.has_signal(stream_guid) {
            return false;
        }
        self.selections = BitField::new(bitmask);
        true
    }

    /// Selects or clears exactly the `count` signals of this set.
    pub fn set_all_selected(&mut self, selected: bool) {
        let mask = match self.signal_count() {
            MAX_SIGNALS_PER_SET => u32::MAX,
            n => (1u32 << n) - 1,
        };
        self.selections = BitField::new(if selected { mask } else { 0 });
    }

    pub fn clear_selections(&mut self) {
        self.selections = BitField::new(0);
    }

    pub fn signals(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.signal_count()).filter_map(move |i| self.signal_guid_at(i))
    }
}

/// Selection state for every stream type published by one front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontEndSelection {
    pub header: PropertyHeader,
    pub processor: u8,
    pub port: u8,
    pub front_end: u8,
    pub port_char: char,
    pub label: String,
    sets: Vec<SignalSelectionSet>,
}

impl FrontEndSelection {
    pub const ENCODED_LEN: usize =
        PropertyHeader::LEN + 4 + STRLEN_LABEL + SIGNAL_TYPE_SLOTS * SignalSelectionSet::ENCODED_LEN;

    /// Builds a descriptor; sets beyond the slot limit are dropped.
    pub fn new(
        processor: u8,
        port: u8,
        front_end: u8,
        port_char: char,
        label: &str,
        sets: &[SignalSelectionSet],
    ) -> Self {
        let mut slots = vec![SignalSelectionSet::default(); SIGNAL_TYPE_SLOTS];
        for (slot, set) in slots.iter_mut().zip(sets) {
            *slot = *set;
        }
        Self {
            header: PropertyHeader::new(property_type::FE_SIGNAL_SELECTION),
            processor,
            port,
            front_end,
            port_char,
            label: label.to_string(),
            sets: slots,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PropertyHeader::decode(data)?;
        let sets_offset = PropertyHeader::LEN + 4 + STRLEN_LABEL;
        let sets = (0..SIGNAL_TYPE_SLOTS)
            .map(|i| SignalSelectionSet::decode(data, sets_offset + i * SignalSelectionSet::ENCODED_LEN))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            header,
            processor: read_u8(data, 4, "front end selection")?,
            port: read_u8(data, 5, "front end selection")?,
            front_end: read_u8(data, 6, "front end selection")?,
            port_char: read_u8(data, 7, "front end selection")? as char,
            label: read_fixed_str(data, 8, STRLEN_LABEL, "front end selection")?,
            sets,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        buf.push(self.processor);
        buf.push(self.port);
        buf.push(self.front_end);
        buf.push(u8::try_from(self.port_char).unwrap_or(b'?'));
        put_fixed_str(buf, &self.label, STRLEN_LABEL);
        for set in &self.sets {
            set.encode_into(buf);
        }
    }

    /// Sets up to the first zero GUID.
    pub fn populated(&self) -> impl Iterator<Item = &SignalSelectionSet> {
        self.sets.iter().take_while(|set| set.guid != 0)
    }

    fn populated_mut(&mut self) -> impl Iterator<Item = &mut SignalSelectionSet> {
        self.sets.iter_mut().take_while(|set| set.guid != 0)
    }

    pub fn has_signal(&self, guid: u32) -> bool {
        self.populated().any(|set| set.has_signal(guid))
    }

    pub fn is_selected(&self, guid: u32) -> bool {
        self.populated().any(|set| set.is_selected(guid))
    }

    pub fn set_selection(&mut self, guid: u32, selected: bool) -> bool {
        self.populated_mut().any(|set| set.set_selection(guid, selected))
    }

    pub fn set_selections(&mut self, stream_guid: u32, bitmask: u32) -> bool {
        self.populated_mut().any(|set| set.set_selections(stream_guid, bitmask))
    }

    pub fn set_all_selected(&mut self, selected: bool) {
        self.populated_mut().for_each(|set| set.set_all_selected(selected));
    }

    pub fn clear_selections(&mut self) {
        self.sets.iter_mut().for_each(SignalSelectionSet::clear_selections);
    }

    /// Every signal of every populated set, in set order.
    pub fn signals(&self) -> Vec<u32> {
        self.populated().flat_map(SignalSelectionSet::signals).collect()
    }

    pub fn selected_signals(&self) -> Vec<u32> {
        self.signals().into_iter().filter(|&guid| self.is_selected(guid)).collect()
    }
}
