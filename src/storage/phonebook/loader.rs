use tracing::{debug, info, warn};

use crate::primitives::io::CardOp;
use crate::storage::pbr::{EfTag, Linkage, PbrTable};
use crate::storage::record::{AdnRecord, AuxKind, AuxStore};
use crate::types::{Result, SimError};

use super::{BlockState, Phonebook};

impl Phonebook {
    /// Loads every block and returns the normalized entries in global order.
    ///
    /// The reference file is parsed once per session. A block whose address
    /// records fail to load is skipped and retried by the next call; a failed
    /// auxiliary kind leaves only that kind absent.
    pub fn load(&mut self) -> Result<Vec<AdnRecord>> {
        self.ensure_pbr()?;
        for block in 0..self.blocks.len() {
            if let Err(err) = self.load_block(block) {
                warn!(block, error = %err, "pbook.loader.block_failed");
            }
        }
        Ok(self.entries())
    }

    /// Populates the raw stores of one block and joins them.
    ///
    /// A loaded block is left untouched: no card request is issued until
    /// [`Phonebook::invalidate`] or [`Phonebook::reset`].
    pub fn load_block(&mut self, block: usize) -> Result<()> {
        self.ensure_pbr()?;
        let state = self.blocks.get(block).ok_or(SimError::NoSuchBlock(block))?;
        if state.adn.is_some() {
            return Ok(());
        }
        self.load_adn(block)?;
        for kind in AuxKind::ALL {
            if self.blocks[block].store(kind).is_some() {
                continue;
            }
            if let Err(err) = self.load_aux(block, kind) {
                warn!(block, kind = kind.name(), error = %err, "pbook.loader.aux_failed");
            }
        }
        self.join_block(block);
        Ok(())
    }

    fn ensure_pbr(&mut self) -> Result<()> {
        if self.pbr_absent {
            return Err(SimError::PbrAbsent);
        }
        if self.pbr.is_some() {
            return Ok(());
        }
        let fid = self.options().pbr_fid;
        let records = self.round_trip(CardOp::ReadAll, self.options().io.read_all(fid))?;
        if records.is_empty() {
            self.pbr_absent = true;
            warn!(%fid, "pbook.loader.pbr_absent");
            return Err(SimError::PbrAbsent);
        }
        let table = PbrTable::parse(&records);
        info!(
            blocks = table.len(),
            email = ?table.linkage(AuxKind::Email),
            anr = ?table.linkage(AuxKind::Anr),
            "pbook.loader.pbr_loaded"
        );
        self.blocks = (0..table.len()).map(|_| BlockState::default()).collect();
        self.pbr = Some(table);
        Ok(())
    }

    fn load_adn(&mut self, block: usize) -> Result<()> {
        let fid = self.file_of(block, EfTag::Adn)?;
        let raw = self.round_trip(CardOp::ReadAll, self.options().io.read_all(fid))?;
        let mut records: Vec<AdnRecord> = raw
            .iter()
            .enumerate()
            .map(|(index, data)| AdnRecord::decode(fid, index + 1, data))
            .collect();
        if records.iter().any(|rec| rec.ext_record().is_some()) {
            self.load_extensions(block, &mut records);
        }
        let count = records.len();
        let state = &mut self.blocks[block];
        state.valid_slots = if count == 0 {
            vec![1]
        } else {
            (1..=count).collect()
        };
        state.adn = Some(records);
        debug!(block, %fid, records = count, "pbook.loader.adn_loaded");
        Ok(())
    }

    fn load_extensions(&self, block: usize, records: &mut [AdnRecord]) {
        let Ok(fid) = self.file_of(block, EfTag::Ext1) else {
            warn!(block, "pbook.loader.ext1_missing");
            return;
        };
        match self.round_trip(CardOp::ReadAll, self.options().io.read_all(fid)) {
            Ok(ext) => records.iter_mut().for_each(|rec| rec.append_extension(&ext)),
            Err(err) => warn!(block, %fid, error = %err, "pbook.loader.ext1_failed"),
        }
    }

    fn load_aux(&mut self, block: usize, kind: AuxKind) -> Result<()> {
        let Some(fid) = self.pbr_block(block)?.file(kind.tag()) else {
            debug!(block, kind = kind.name(), "pbook.loader.no_file");
            return Ok(());
        };
        let linkage = self.table()?.linkage(kind);
        let records = match linkage {
            Linkage::Type2 { .. } => {
                if !self.ensure_iap(block, kind)? {
                    return Ok(());
                }
                self.round_trip(CardOp::ReadAll, self.options().io.read_all(fid))?
            }
            Linkage::Type1 => {
                let slots = &self.blocks[block].valid_slots;
                self.round_trip(
                    CardOp::ReadSubset,
                    self.options().io.read_subset(fid, slots),
                )?
            }
        };
        debug!(block, kind = kind.name(), %fid, records = records.len(), "pbook.loader.aux_loaded");
        *self.blocks[block].store_mut(kind) = Some(AuxStore::new(records));
        Ok(())
    }

    /// Makes the block's EF_IAP records available; false when there are none.
    fn ensure_iap(&mut self, block: usize, kind: AuxKind) -> Result<bool> {
        if self.blocks[block].iap.is_some() && self.options().share_iap_between_kinds {
            return Ok(true);
        }
        let Some(fid) = self.pbr_block(block)?.file(EfTag::Iap) else {
            warn!(block, kind = kind.name(), "pbook.loader.iap_missing");
            return Ok(false);
        };
        let slots = &self.blocks[block].valid_slots;
        let records = self.round_trip(
            CardOp::ReadSubset,
            self.options().io.read_subset(fid, slots),
        )?;
        if records.is_empty() {
            warn!(block, kind = kind.name(), %fid, "pbook.loader.iap_empty");
            self.blocks[block].iap = None;
            return Ok(false);
        }
        debug!(block, %fid, records = records.len(), "pbook.loader.iap_loaded");
        self.blocks[block].iap = Some(records);
        Ok(true)
    }
}
