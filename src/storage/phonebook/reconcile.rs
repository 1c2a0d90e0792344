use tracing::{debug, warn};

use crate::storage::pbr::Linkage;
use crate::storage::record::{AdnRecord, AuxKind, AuxStore};

use super::{BlockState, Phonebook};

/// Highest slot an EF_IAP byte can name.
pub(crate) const MAX_IAP_SLOT: u8 = 0x7F;

/// 1-based auxiliary slot named by an EF_IAP record, if any.
///
/// Pointer bytes are signed: only `0x01..=0x7F` name a slot. `0x00`, the
/// `0xFF` fill and every other byte with the high bit set mean "no value",
/// as does a record too short to hold the offset.
pub(crate) fn iap_slot(record: &[u8], offset: usize) -> Option<usize> {
    match record.get(offset).copied() {
        Some(slot @ 0x01..=MAX_IAP_SLOT) => Some(slot as usize),
        _ => None,
    }
}

/// Attaches the decoded values of `store` to `entries` and marks the slots used.
///
/// Returns the number of values attached.
pub(crate) fn join(
    entries: &mut [AdnRecord],
    store: &mut AuxStore,
    kind: AuxKind,
    linkage: Linkage,
    iap: Option<&[Vec<u8>]>,
) -> usize {
    let mut attached = 0;
    match linkage {
        Linkage::Type2 { iap_offset } => {
            let Some(iap) = iap else {
                warn!(kind = kind.name(), "pbook.reconcile.iap_absent");
                return 0;
            };
            if iap.len() < entries.len() {
                warn!(
                    kind = kind.name(),
                    iap = iap.len(),
                    entries = entries.len(),
                    "pbook.reconcile.iap_short"
                );
            }
            for (entry, record) in entries.iter_mut().zip(iap) {
                let Some(slot) = iap_slot(record, iap_offset) else {
                    continue;
                };
                let Some(raw) = store.record(slot - 1) else {
                    warn!(kind = kind.name(), slot, records = store.len(), "pbook.reconcile.slot_out_of_range");
                    continue;
                };
                let value = kind.decode(raw);
                if value.is_empty() {
                    continue;
                }
                entry.values_mut(kind).push(value);
                store.mark_used(slot - 1);
                attached += 1;
            }
        }
        Linkage::Type1 => {
            // EF_ANR may hold fewer records than EF_ADN; the tail gets nothing.
            let limit = store.len().min(entries.len());
            for (index, entry) in entries.iter_mut().enumerate().take(limit) {
                let Some(raw) = store.record(index) else {
                    break;
                };
                let value = kind.decode(raw);
                if value.is_empty() {
                    continue;
                }
                entry.values_mut(kind).push(value);
                store.mark_used(index);
                attached += 1;
            }
        }
    }
    attached
}

impl Phonebook {
    /// Rebuilds the auxiliary values and occupancy flags of one block from its raw stores.
    pub(crate) fn join_block(&mut self, block: usize) {
        let Some(table) = self.pbr.as_ref() else {
            return;
        };
        let linkages = AuxKind::ALL.map(|kind| (kind, table.linkage(kind)));
        let Some(BlockState {
            adn: Some(entries),
            iap,
            email,
            anr,
            ..
        }) = self.blocks.get_mut(block)
        else {
            return;
        };
        for (kind, linkage) in linkages {
            entries
                .iter_mut()
                .for_each(|entry| entry.values_mut(kind).clear());
            let store = match kind {
                AuxKind::Email => email.as_mut(),
                AuxKind::Anr => anr.as_mut(),
            };
            let Some(store) = store else {
                continue;
            };
            store.clear_flags();
            let attached = join(entries, store, kind, linkage, iap.as_deref());
            debug!(block, kind = kind.name(), attached, "pbook.reconcile.joined");
        }
    }
}
