use std::sync::Arc;

use tracing::{debug, warn};

use crate::primitives::io::{CardOp, SENTINEL};
use crate::storage::pbr::{EfTag, Linkage};
use crate::storage::record::AuxKind;
use crate::types::{Result, SimError};

use super::reconcile::{iap_slot, MAX_IAP_SLOT};
use super::Phonebook;

fn record_byte(number: usize) -> Result<u8> {
    u8::try_from(number).map_err(|_| SimError::Invalid("record number exceeds one byte"))
}

impl Phonebook {
    /// Replaces one auxiliary value of the entry at `global`.
    ///
    /// An empty `old` adds a value, an empty `new` deletes one. Returns false
    /// on any failure; the cause is logged.
    pub fn update_field(&mut self, global: usize, old: &str, new: &str, kind: AuxKind) -> bool {
        match self.try_update_field(global, old, new, kind) {
            Ok(()) => true,
            Err(err) => {
                warn!(global, kind = kind.name(), error = %err, "pbook.update.failed");
                false
            }
        }
    }

    /// [`Phonebook::update_field`] for EF_EMAIL.
    pub fn update_email(&mut self, global: usize, old: &str, new: &str) -> bool {
        self.update_field(global, old, new, AuxKind::Email)
    }

    /// [`Phonebook::update_field`] for EF_ANR.
    pub fn update_anr(&mut self, global: usize, old: &str, new: &str) -> bool {
        self.update_field(global, old, new, AuxKind::Anr)
    }

    /// Same as [`Phonebook::update_field`], reporting why it failed.
    ///
    /// The auxiliary record is written before the EF_IAP record. A failure
    /// between the two writes leaves them disagreeing on the card until the
    /// caller retries or resets; nothing is rolled back.
    pub fn try_update_field(
        &mut self,
        global: usize,
        old: &str,
        new: &str,
        kind: AuxKind,
    ) -> Result<()> {
        let (block, offset) = self
            .block_of(global)
            .ok_or(SimError::IndexOutOfRange(global))?;
        let fid = self.file_of(block, kind.tag())?;
        let linkage = self.table()?.linkage(kind);
        let slot = self.resolve_slot(block, offset, kind, linkage, old)?;

        let io = Arc::clone(&self.options().io);
        let size = self.round_trip(CardOp::Size, io.size_info(fid))?;
        if !size.contains(slot) {
            return Err(SimError::SlotOutOfRange {
                slot,
                count: size.record_count,
            });
        }
        let back_ref = match linkage {
            Linkage::Type2 { .. } => Some(record_byte(offset + 1)?),
            Linkage::Type1 => None,
        };
        let data = kind.encode(size.record_len, new, back_ref)?;
        let stored = kind.decode(&data);
        self.round_trip(CardOp::Write, io.write_one(fid, slot, data.clone()))?;
        if let Some(store) = self.blocks[block].store_mut(kind).as_mut() {
            store.put(slot - 1, data);
        }
        self.metrics().slot_written(kind);
        debug!(block, offset, slot, %fid, kind = kind.name(), "pbook.update.slot_written");

        if let Linkage::Type2 { iap_offset } = linkage {
            if old.is_empty() != new.is_empty() {
                let pointer = if new.is_empty() { 0 } else { slot };
                self.rewrite_iap(block, offset, iap_offset, pointer)?;
            }
        }
        self.apply_to_entry(block, offset, kind, stored);
        Ok(())
    }

    /// Picks the 1-based auxiliary record an edit of entry `offset` writes to.
    fn resolve_slot(
        &self,
        block: usize,
        offset: usize,
        kind: AuxKind,
        linkage: Linkage,
        old: &str,
    ) -> Result<usize> {
        let Linkage::Type2 { iap_offset } = linkage else {
            return Ok(offset + 1);
        };
        let state = &self.blocks[block];
        let record = state
            .iap
            .as_ref()
            .and_then(|iap| iap.get(offset))
            .ok_or(SimError::NotLoaded("index-pointer"))?;
        if let Some(slot) = iap_slot(record, iap_offset) {
            return Ok(slot);
        }
        if !old.is_empty() {
            return Err(SimError::NoLinkedSlot);
        }
        let store = state.store(kind).ok_or(SimError::NotLoaded(kind.name()))?;
        store
            .first_free()
            .map(|index| index + 1)
            .filter(|slot| *slot <= MAX_IAP_SLOT as usize)
            .ok_or(SimError::NoFreeSlot)
    }

    /// Points byte `iap_offset` of the entry's EF_IAP record at `pointer` (0 clears it).
    fn rewrite_iap(
        &mut self,
        block: usize,
        offset: usize,
        iap_offset: usize,
        pointer: usize,
    ) -> Result<()> {
        let fid = self.file_of(block, EfTag::Iap)?;
        let io = Arc::clone(&self.options().io);
        let size = self.round_trip(CardOp::Size, io.size_info(fid))?;
        let record_number = offset + 1;
        if !size.contains(record_number) {
            return Err(SimError::SlotOutOfRange {
                slot: record_number,
                count: size.record_count,
            });
        }
        if iap_offset >= size.record_len {
            return Err(SimError::Corruption("index-pointer offset beyond record"));
        }
        let mut data = self.blocks[block]
            .iap
            .as_ref()
            .and_then(|iap| iap.get(offset))
            .cloned()
            .unwrap_or_default();
        data.resize(size.record_len, SENTINEL);
        data[iap_offset] = record_byte(pointer)?;
        self.round_trip(CardOp::Write, io.write_one(fid, record_number, data.clone()))?;
        if let Some(record) = self.blocks[block]
            .iap
            .as_mut()
            .and_then(|iap| iap.get_mut(offset))
        {
            *record = data;
        }
        self.metrics().iap_rewritten();
        debug!(block, offset, pointer, %fid, "pbook.update.iap_rewritten");
        Ok(())
    }

    /// Mirrors the written slot into the entry; each kind links one slot per entry.
    fn apply_to_entry(&mut self, block: usize, offset: usize, kind: AuxKind, stored: String) {
        let Some(entry) = self.blocks[block]
            .adn
            .as_mut()
            .and_then(|adn| adn.get_mut(offset))
        else {
            return;
        };
        let values = entry.values_mut(kind);
        values.clear();
        if !stored.is_empty() {
            values.push(stored);
        }
    }
}
