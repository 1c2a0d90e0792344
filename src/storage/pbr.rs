//! Phonebook reference file (EF_PBR) decoding.
//!
//! Each PBR record describes one phonebook block: constructed objects tagged
//! `A8` (type 1 files), `A9` (type 2 files, reached through EF_IAP) and `AA`
//! (type 3 files), each holding EF tags with 2-byte file ids.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::primitives::bytes::tlv::TlvReader;
use crate::storage::record::AuxKind;
use crate::types::FileId;

/// Constructed object listing type 1 files.
pub const TYPE1_TAG: u8 = 0xA8;
/// Constructed object listing type 2 files; child order gives EF_IAP byte offsets.
pub const TYPE2_TAG: u8 = 0xA9;
/// Constructed object listing type 3 files.
pub const TYPE3_TAG: u8 = 0xAA;

/// Elementary-file tags found inside PBR constructed objects.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum EfTag {
    /// Abbreviated dialing numbers.
    Adn = 0xC0,
    /// Index administration (pointers into type 2 files).
    Iap = 0xC1,
    /// Number overflow records.
    Ext1 = 0xC2,
    /// Second name entry.
    Sne = 0xC3,
    /// Additional numbers.
    Anr = 0xC4,
    /// Phonebook control.
    Pbc = 0xC5,
    /// Grouping.
    Grp = 0xC6,
    /// Additional number alpha strings.
    Aas = 0xC7,
    /// Grouping information alpha strings.
    Gsd = 0xC8,
    /// Unique identifiers.
    Uid = 0xC9,
    /// Email addresses.
    Email = 0xCA,
    /// Capability configuration parameters.
    Ccp1 = 0xCB,
}

impl EfTag {
    /// Tag for a raw TLV tag byte; `None` for tags outside `C0..=CB`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xC0 => Self::Adn,
            0xC1 => Self::Iap,
            0xC2 => Self::Ext1,
            0xC3 => Self::Sne,
            0xC4 => Self::Anr,
            0xC5 => Self::Pbc,
            0xC6 => Self::Grp,
            0xC7 => Self::Aas,
            0xC8 => Self::Gsd,
            0xC9 => Self::Uid,
            0xCA => Self::Email,
            0xCB => Self::Ccp1,
            _ => return None,
        })
    }

    /// Raw TLV tag byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// How an auxiliary EF's records are associated with address entries.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub enum Linkage {
    /// Record `i` belongs to ADN record `i`.
    #[default]
    Type1,
    /// The ADN entry's EF_IAP record holds the 1-based record number at `iap_offset`.
    Type2 {
        /// Byte offset inside every EF_IAP record.
        iap_offset: usize,
    },
}

impl Linkage {
    /// True for index-pointer linkage.
    pub fn is_type2(self) -> bool {
        matches!(self, Linkage::Type2 { .. })
    }
}

/// One PBR record: the EFs backing a phonebook block.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Block {
    /// 0-based PBR record index.
    pub index: usize,
    files: BTreeMap<EfTag, FileId>,
}

impl Block {
    /// File id registered for `tag` in this block.
    pub fn file(&self, tag: EfTag) -> Option<FileId> {
        self.files.get(&tag).copied()
    }

    /// Every `(tag, file id)` pair in tag order.
    pub fn files(&self) -> impl Iterator<Item = (EfTag, FileId)> + '_ {
        self.files.iter().map(|(tag, fid)| (*tag, *fid))
    }

    /// True when the record named no recognized files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Parsed reference file: the ordered blocks plus the card-wide linkage per auxiliary kind.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PbrTable {
    blocks: Vec<Block>,
    email: Linkage,
    anr: Linkage,
}

impl PbrTable {
    /// Decodes one block per raw record.
    ///
    /// Linkage is card-wide: an EMAIL or ANR tag inside any `A9` object turns
    /// that kind to [`Linkage::Type2`], and a later block overrides the offset.
    pub fn parse(records: &[Vec<u8>]) -> Self {
        let mut table = PbrTable::default();
        for (index, record) in records.iter().enumerate() {
            let block = table.parse_block(index, record);
            debug!(block = index, files = block.files.len(), "pbook.pbr.block");
            table.blocks.push(block);
        }
        table
    }

    fn parse_block(&mut self, index: usize, record: &[u8]) -> Block {
        let mut block = Block {
            index,
            files: BTreeMap::new(),
        };
        for container in TlvReader::new(record) {
            if !matches!(container.tag, TYPE1_TAG | TYPE2_TAG | TYPE3_TAG) {
                continue;
            }
            for (ordinal, ef) in container.nested().enumerate() {
                let Some(tag) = EfTag::from_byte(ef.tag) else {
                    continue;
                };
                if container.tag == TYPE2_TAG {
                    let linkage = Linkage::Type2 {
                        iap_offset: ordinal,
                    };
                    match tag {
                        EfTag::Email => self.email = linkage,
                        EfTag::Anr => self.anr = linkage,
                        _ => {}
                    }
                }
                if let Some(fid) = FileId::from_be_slice(ef.value) {
                    block.files.insert(tag, fid);
                }
            }
        }
        block
    }

    /// Blocks in PBR record order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block parsed from PBR record `index`.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True when the reference file held no records.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Card-wide linkage of `kind`; the last block naming it wins.
    pub fn linkage(&self, kind: AuxKind) -> Linkage {
        match kind {
            AuxKind::Email => self.email,
            AuxKind::Anr => self.anr,
        }
    }
}
