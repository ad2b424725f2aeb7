//! Discovery state of one dependent property block

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{ConfigTarget, PropertyBlock, RecordingTrialDescriptor};
use crate::wire::{ConfigFrame, Property};

/// The three blocks a trial descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockRole {
    ExtendedInfo,
    SignalSelection,
    FileNames,
}

impl BlockRole {
    pub const ALL: [BlockRole; 3] =
        [BlockRole::ExtendedInfo, BlockRole::SignalSelection, BlockRole::FileNames];

    pub fn block_id(self, trial: &RecordingTrialDescriptor) -> u16 {
        match self {
            BlockRole::ExtendedInfo => trial.ext_info_block,
            BlockRole::SignalSelection => trial.sig_selection_block,
            BlockRole::FileNames => trial.file_names_block,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockRole::ExtendedInfo => "extended info",
            BlockRole::SignalSelection => "signal selection",
            BlockRole::FileNames => "file names",
        }
    }
}

/// One stored block member, with the target it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockItem {
    pub target: ConfigTarget,
    pub property: Property,
}

#[derive(Debug, Clone, PartialEq)]
enum BlockState {
    NotQueried,
    HeaderQueried,
    /// Header received and one query issued per member.
    ItemsQueried { target: ConfigTarget, block: PropertyBlock, items: Vec<Option<BlockItem>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockTracker {
    role: BlockRole,
    id: u16,
    state: BlockState,
}

impl BlockTracker {
    pub fn new(role: BlockRole, id: u16) -> Self {
        Self { role, id, state: BlockState::NotQueried }
    }

    pub fn role(&self) -> BlockRole {
        self.role
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Forget everything learned about the block, keeping its ID.
    pub fn reset(&mut self) {
        self.state = BlockState::NotQueried;
    }

    pub fn needs_header_query(&self) -> bool {
        self.state == BlockState::NotQueried
    }

    pub fn mark_header_queried(&mut self) {
        if self.state == BlockState::NotQueried {
            self.state = BlockState::HeaderQueried;
        }
    }

    pub fn header_received(&self) -> bool {
        matches!(self.state, BlockState::ItemsQueried { .. })
    }

    pub fn block(&self) -> Option<&PropertyBlock> {
        match &self.state {
            BlockState::ItemsQueried { block, .. } => Some(block),
            _ => None,
        }
    }

    /// Accept the block header and return one query per member property.
    ///
    /// A header for a block whose items are already being read is ignored so
    /// that duplicate replies never discard stored items.
    ///
    /// Members whose IDs would overflow the property space are dropped from
    /// the block.
    pub fn accept_header(&mut self, target: ConfigTarget, mut block: PropertyBlock) -> Vec<ConfigFrame> {
        if self.header_received() {
            return Vec::new();
        }
        let addressable = block.addressable_count();
        if addressable < block.count {
            warn!(
                "Block {} declares {} items from {}, only {} are addressable",
                self.id, block.count, block.first, addressable
            );
            block.count = addressable;
        }
        debug!(
            "Block {} ({}) has {} items starting at {}",
            self.id,
            self.role.name(),
            block.count,
            block.first
        );
        let queries =
            block.ids().map(|id| ConfigFrame::query(target.with_property(id))).collect();
        let items = vec![None; block.count as usize];
        self.state = BlockState::ItemsQueried { target, block, items };
        queries
    }

    pub fn contains_item(&self, id: u16) -> bool {
        self.block().is_some_and(|block| block.contains(id))
    }

    /// Store a member reply in its slot. Returns `false` for IDs outside the block.
    pub fn accept_item(&mut self, target: ConfigTarget, property: Property) -> bool {
        let BlockState::ItemsQueried { block, items, .. } = &mut self.state else {
            return false;
        };
        let Some(slot) = block.index_of(target.property).and_then(|index| items.get_mut(index))
        else {
            return false;
        };
        *slot = Some(BlockItem { target, property });
        true
    }

    pub fn item(&self, index: usize) -> Option<&BlockItem> {
        match &self.state {
            BlockState::ItemsQueried { items, .. } => items.get(index).and_then(Option::as_ref),
            _ => None,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &BlockItem> {
        let items: &[Option<BlockItem>] = match &self.state {
            BlockState::ItemsQueried { items, .. } => items,
            _ => &[],
        };
        items.iter().flatten()
    }

    /// Empty a slot so the next reply for it counts again. Returns the query
    /// that re-reads it.
    pub fn clear_item(&mut self, index: usize) -> Option<ConfigFrame> {
        let BlockState::ItemsQueried { target, block, items } = &mut self.state else {
            return None;
        };
        let slot = items.get_mut(index)?;
        *slot = None;
        let id = block.first.checked_add(index as u16)?;
        Some(ConfigFrame::query(target.with_property(id)))
    }

    pub fn items_received(&self) -> usize {
        self.items().count()
    }

    pub fn items_expected(&self) -> usize {
        self.block().map_or(0, |block| block.count as usize)
    }

    pub fn is_complete(&self) -> bool {
        self.header_received() && self.items_received() == self.items_expected()
    }
}
