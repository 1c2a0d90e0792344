use std::sync::Arc;

use tracing::info;

use crate::primitives::concurrency::Pending;
use crate::primitives::io::CardOp;
use crate::types::{FileId, Result, SimError};

use super::metrics::{default_metrics, CardMetrics};
use super::options::PhonebookOptions;
use super::pbr::{Block, EfTag, PbrTable};
use super::record::{AdnRecord, AuxKind, AuxStore};

mod capacity;
mod loader;
mod reconcile;
mod update;

pub use capacity::UNBOUNDED;

/// Per-block raw state: the decoded address records plus the auxiliary stores.
#[derive(Debug, Default)]
pub(crate) struct BlockState {
    /// Address records in slot order; `None` until loaded (or after invalidation).
    pub(crate) adn: Option<Vec<AdnRecord>>,
    /// 1-based ADN record numbers used for positional and index-pointer reads.
    pub(crate) valid_slots: Vec<usize>,
    /// EF_IAP records, one per address record.
    pub(crate) iap: Option<Vec<Vec<u8>>>,
    pub(crate) email: Option<AuxStore>,
    pub(crate) anr: Option<AuxStore>,
}

impl BlockState {
    pub(crate) fn entry_count(&self) -> usize {
        self.adn.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn store(&self, kind: AuxKind) -> Option<&AuxStore> {
        match kind {
            AuxKind::Email => self.email.as_ref(),
            AuxKind::Anr => self.anr.as_ref(),
        }
    }

    pub(crate) fn store_mut(&mut self, kind: AuxKind) -> &mut Option<AuxStore> {
        match kind {
            AuxKind::Email => &mut self.email,
            AuxKind::Anr => &mut self.anr,
        }
    }
}

/// One USIM phonebook session.
///
/// Owns every piece of mutable state (reference table, raw stores, occupancy
/// flags). Each card request is a blocking round trip, so at most one is in
/// flight. Callers needing shared access wrap the session in a mutex.
pub struct Phonebook {
    opts: PhonebookOptions,
    metrics: Arc<dyn CardMetrics>,
    pub(crate) pbr: Option<PbrTable>,
    pub(crate) pbr_absent: bool,
    pub(crate) blocks: Vec<BlockState>,
}

impl Phonebook {
    /// Creates an empty session; nothing is read until [`Phonebook::load`].
    pub fn new(opts: PhonebookOptions) -> Self {
        let metrics = opts.metrics.clone().unwrap_or_else(default_metrics);
        Self {
            opts,
            metrics,
            pbr: None,
            pbr_absent: false,
            blocks: Vec::new(),
        }
    }

    /// Options the session was built with.
    pub fn options(&self) -> &PhonebookOptions {
        &self.opts
    }

    /// Drops every cached record, the reference table and the linkage modes.
    pub fn reset(&mut self) {
        self.pbr = None;
        self.pbr_absent = false;
        self.blocks.clear();
        info!("pbook.reset");
    }

    /// Forces the address records to be re-read on the next load.
    ///
    /// Auxiliary stores stay cached until [`Phonebook::reset`].
    pub fn invalidate(&mut self) {
        for block in &mut self.blocks {
            block.adn = None;
        }
        info!(blocks = self.blocks.len(), "pbook.invalidate");
    }

    /// Parsed reference table, if loaded.
    pub fn pbr(&self) -> Option<&PbrTable> {
        self.pbr.as_ref()
    }

    /// True once the reference file was found empty; loads fail until reset.
    pub fn is_absent(&self) -> bool {
        self.pbr_absent
    }

    /// Normalized entries of every loaded block, in global order.
    pub fn entries(&self) -> Vec<AdnRecord> {
        self.blocks
            .iter()
            .filter_map(|b| b.adn.as_ref())
            .flatten()
            .cloned()
            .collect()
    }

    /// Entry at a global 0-based position.
    pub fn entry(&self, global: usize) -> Option<&AdnRecord> {
        let (block, offset) = self.block_of(global)?;
        self.blocks[block].adn.as_ref()?.get(offset)
    }

    /// Total number of loaded address entries.
    pub fn entry_count(&self) -> usize {
        self.blocks.iter().map(BlockState::entry_count).sum()
    }

    /// Number of address entries in `block`.
    pub fn block_entry_count(&self, block: usize) -> usize {
        self.blocks.get(block).map_or(0, BlockState::entry_count)
    }

    /// Global position of the first entry of `block`.
    pub fn block_offset(&self, block: usize) -> usize {
        self.blocks
            .iter()
            .take(block)
            .map(BlockState::entry_count)
            .sum()
    }

    /// Resolves a global position into `(block, in-block offset)`.
    pub fn block_of(&self, global: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (index, block) in self.blocks.iter().enumerate() {
            let count = block.entry_count();
            if global < start + count {
                return Some((index, global - start));
            }
            start += count;
        }
        None
    }

    pub(crate) fn table(&self) -> Result<&PbrTable> {
        self.pbr.as_ref().ok_or(SimError::NotLoaded("reference file"))
    }

    pub(crate) fn pbr_block(&self, block: usize) -> Result<&Block> {
        self.table()?.block(block).ok_or(SimError::NoSuchBlock(block))
    }

    pub(crate) fn file_of(&self, block: usize, tag: EfTag) -> Result<FileId> {
        self.pbr_block(block)?
            .file(tag)
            .ok_or(SimError::MissingFile {
                block,
                tag: tag.to_byte(),
            })
    }

    pub(crate) fn metrics(&self) -> &dyn CardMetrics {
        self.metrics.as_ref()
    }

    /// Waits for one outstanding card request and records its outcome.
    pub(crate) fn round_trip<T>(&self, op: CardOp, ticket: Pending<T>) -> Result<T> {
        let outcome = ticket.wait();
        self.metrics.round_trip(op, outcome.is_ok());
        outcome
    }
}
