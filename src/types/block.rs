//! Structural properties that address other properties

use serde::{Deserialize, Serialize};

use super::header::PropertyHeader;
use super::xipp_ids::{STRLEN_LABEL, property_type};
use crate::Result;
use crate::wire::bytes::{put_fixed_str, put_u16_le, read_fixed_str, read_u16_le, read_u8};

/// A contiguous run of `count` properties starting at `first`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBlock {
    pub header: PropertyHeader,
    pub first: u16,
    pub count: u16,
    /// Index of the start item when the block is used as a ring.
    pub circular_start: u16,
    pub item_type: u16,
    pub description: String,
}

impl PropertyBlock {
    pub const ENCODED_LEN: usize = PropertyHeader::LEN + 8 + STRLEN_LABEL;

    pub fn new(first: u16, count: u16, item_type: u16, description: &str) -> Self {
        Self {
            header: PropertyHeader::new(property_type::PROPERTY_BLOCK),
            first,
            count,
            circular_start: 0,
            item_type,
            description: description.to_string(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            header: PropertyHeader::decode(data)?,
            first: read_u16_le(data, 4, "property block")?,
            count: read_u16_le(data, 6, "property block")?,
            circular_start: read_u16_le(data, 8, "property block")?,
            item_type: read_u16_le(data, 10, "property block")?,
            description: read_fixed_str(data, 12, STRLEN_LABEL, "property block")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_u16_le(buf, self.first);
        put_u16_le(buf, self.count);
        put_u16_le(buf, self.circular_start);
        put_u16_le(buf, self.item_type);
        put_fixed_str(buf, &self.description, STRLEN_LABEL);
    }

    /// Half-open membership test over `[first, first + count)`.
    pub fn contains(&self, id: u16) -> bool {
        let id = id as u32;
        let first = self.first as u32;
        id >= first && id < first + self.count as u32
    }

    /// Position of `id` within the block.
    pub fn index_of(&self, id: u16) -> Option<usize> {
        self.contains(id).then(|| (id - self.first) as usize)
    }

    /// Member IDs in order. IDs that would overflow the 16-bit space are not produced.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.count).map_while(move |i| self.first.checked_add(i))
    }

    /// Number of members whose IDs fit the 16-bit property space.
    pub fn addressable_count(&self) -> u16 {
        self.count.min((u16::MAX - self.first).saturating_add(1))
    }
}

/// An explicit, possibly sparse set of property IDs of one declared type.
///
/// Lists carry no type tag of their own, so they are decoded by the caller
/// that knows the property holds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyList {
    pub header: PropertyHeader,
    pub vendor: u8,
    pub item_type: u8,
    pub ids: Vec<u16>,
}

impl PropertyList {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PropertyHeader::decode(data)?;
        let vendor = read_u8(data, 4, "property list")?;
        let item_type = read_u8(data, 5, "property list")?;
        let len = read_u16_le(data, 6, "property list")? as usize;
        let ids = (0..len)
            .map(|i| read_u16_le(data, 8 + 2 * i, "property list"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { header, vendor, item_type, ids })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        buf.push(self.vendor);
        buf.push(self.item_type);
        put_u16_le(buf, self.ids.len() as u16);
        for id in &self.ids {
            put_u16_le(buf, *id);
        }
    }

    /// Zero entries mark empty slots and never match.
    pub fn contains(&self, id: u16) -> bool {
        id != 0 && self.ids.contains(&id)
    }

    /// The entry whose `[entry, entry + span)` range holds `id`.
    pub fn start_of_range(&self, id: u16, span: u16) -> Option<u16> {
        self.ids.iter().copied().filter(|&entry| entry != 0).find(|&entry| {
            let (id, entry) = (id as u32, entry as u32);
            id >= entry && id < entry + span as u32
        })
    }
}
