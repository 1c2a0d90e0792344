use crate::storage::pbr::Linkage;
use crate::storage::record::{AuxKind, AuxStore};

use super::Phonebook;

/// Reported when capacity cannot be bounded under positional linkage.
pub const UNBOUNDED: usize = 65535;

impl Phonebook {
    /// Free slots of `kind` across every block; [`UNBOUNDED`] unless index-pointer linked.
    pub fn free_count(&self, kind: AuxKind) -> usize {
        match self.pbr.as_ref().map(|table| table.linkage(kind)) {
            Some(Linkage::Type2 { .. }) => self
                .blocks
                .iter()
                .filter_map(|block| block.store(kind))
                .map(AuxStore::free_slots)
                .sum(),
            _ => UNBOUNDED,
        }
    }

    /// Free slots of `kind` in one block (0 when the block has no such store).
    pub fn free_count_in_block(&self, kind: AuxKind, block: usize) -> usize {
        self.blocks
            .get(block)
            .and_then(|state| state.store(kind))
            .map_or(0, AuxStore::free_slots)
    }

    /// Free slots available to the entry at global position `global`.
    pub fn free_count_for_entry(&self, kind: AuxKind, global: usize) -> usize {
        let Some((block, offset)) = self.block_of(global) else {
            return 0;
        };
        let linkage = self
            .pbr
            .as_ref()
            .map_or(Linkage::Type1, |table| table.linkage(kind));
        if linkage.is_type2() {
            // Without EF_IAP records nothing ties this entry to a slot count.
            if self.blocks[block].iap.is_none() {
                return UNBOUNDED;
            }
            return self.free_count_in_block(kind, block);
        }
        match kind {
            AuxKind::Email => UNBOUNDED,
            AuxKind::Anr => {
                let state = &self.blocks[block];
                let Some(store) = state.store(kind) else {
                    return 0;
                };
                if store.len() >= state.entry_count() {
                    store.free_slots()
                } else if offset >= store.len() {
                    // Under-provisioned EF_ANR: this entry never had a slot.
                    0
                } else {
                    UNBOUNDED
                }
            }
        }
    }
}
