use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::primitives::io::{CardImage, MemCard, RecordIo};
use crate::storage::{AuxKind, Linkage, PbrTable, Phonebook, PhonebookOptions, UNBOUNDED};
use crate::types::{FileId, SimError};

/// Errors raised while handling card image files.
#[derive(Debug, Error)]
pub enum CliError {
    /// The image file could not be read.
    #[error("failed to read card image {path}: {source}")]
    Read {
        /// Image path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The image file is not a valid card image.
    #[error("failed to parse card image {path}: {source}")]
    Parse {
        /// Image path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The modified image could not be serialized.
    #[error("failed to serialize card image: {source}")]
    Serialize {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The modified image could not be written.
    #[error("failed to write card image {path}: {source}")]
    Write {
        /// Image path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The phonebook engine rejected the request.
    #[error(transparent)]
    Phonebook(#[from] SimError),
}

/// A phonebook session over a card image file.
pub struct CardFile {
    path: PathBuf,
    card: Arc<MemCard>,
    book: Phonebook,
}

impl CardFile {
    /// Reads the image at `path` and loads its phonebook.
    pub fn open(path: &Path, pbr_fid: FileId) -> Result<Self, CliError> {
        let contents = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let image: CardImage =
            serde_json::from_str(&contents).map_err(|source| CliError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let card = Arc::new(MemCard::from_image(&image)?);
        let io: Arc<dyn RecordIo> = card.clone();
        let mut book = Phonebook::new(PhonebookOptions::new(io).pbr_fid(pbr_fid));
        book.load()?;
        Ok(Self {
            path: path.to_path_buf(),
            card,
            book,
        })
    }

    /// The loaded session.
    pub fn phonebook(&self) -> &Phonebook {
        &self.book
    }

    /// Applies one field edit to the card and the session.
    pub fn update(&mut self, request: &UpdateRequest) -> Result<EntryReport, CliError> {
        self.book
            .try_update_field(request.index, &request.old, &request.new, request.kind)?;
        entry_report(&self.book, request.index).ok_or(CliError::Phonebook(
            SimError::IndexOutOfRange(request.index),
        ))
    }

    /// Writes the current card contents back to the image file.
    pub fn save(&self) -> Result<PathBuf, CliError> {
        let serialized = serde_json::to_string_pretty(&self.card.to_image())
            .map_err(|source| CliError::Serialize { source })?;
        fs::write(&self.path, serialized).map_err(|source| CliError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "cli.image_saved");
        Ok(self.path.clone())
    }
}

/// One requested field edit.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Global entry position.
    pub index: usize,
    /// Field kind.
    pub kind: AuxKind,
    /// Current value; empty to add.
    pub old: String,
    /// Replacement value; empty to delete.
    pub new: String,
}

/// One normalized entry as printed by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    /// Global entry position.
    pub index: usize,
    /// Owning block.
    pub block: usize,
    /// Hex file id of the address file.
    pub ef: String,
    /// 1-based record number in `ef`.
    pub record: usize,
    /// Display name.
    pub alpha: String,
    /// Dialing number.
    pub number: String,
    /// Email addresses.
    pub emails: Vec<String>,
    /// Additional numbers.
    pub additional_numbers: Vec<String>,
}

/// Builds the report of the entry at `index`.
pub fn entry_report(book: &Phonebook, index: usize) -> Option<EntryReport> {
    let (block, _) = book.block_of(index)?;
    let entry = book.entry(index)?;
    Some(EntryReport {
        index,
        block,
        ef: entry.ef_id.to_string(),
        record: entry.record_number,
        alpha: entry.alpha.clone(),
        number: entry.number.clone(),
        emails: entry.emails.clone(),
        additional_numbers: entry.additional_numbers.clone(),
    })
}

/// Reports every entry; with `non_empty` only entries with a name or number.
pub fn list_report(book: &Phonebook, non_empty: bool) -> Vec<EntryReport> {
    (0..book.entry_count())
        .filter_map(|index| entry_report(book, index))
        .filter(|report| !non_empty || !report.alpha.is_empty() || !report.number.is_empty())
        .collect()
}

/// Free-slot figures of one auxiliary kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindCapacity {
    /// Card-wide linkage mode.
    pub linkage: Linkage,
    /// Free slots across all blocks; `None` when unbounded.
    pub total: Option<usize>,
    /// Free slots per block.
    pub blocks: Vec<usize>,
}

/// Free-slot figures printed by `free`.
#[derive(Debug, Clone, Serialize)]
pub struct CapacityReport {
    /// Email slots.
    pub email: KindCapacity,
    /// Additional-number slots.
    pub anr: KindCapacity,
}

/// Builds the capacity report of a loaded session.
pub fn capacity_report(book: &Phonebook) -> CapacityReport {
    let blocks = book.pbr().map_or(0, PbrTable::len);
    let figures = |kind: AuxKind| KindCapacity {
        linkage: book
            .pbr()
            .map_or(Linkage::Type1, |table| table.linkage(kind)),
        total: Some(book.free_count(kind)).filter(|count| *count != UNBOUNDED),
        blocks: (0..blocks)
            .map(|block| book.free_count_in_block(kind, block))
            .collect(),
    };
    CapacityReport {
        email: figures(AuxKind::Email),
        anr: figures(AuxKind::Anr),
    }
}

/// One reference-file block as printed by `pbr`.
#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    /// 0-based block index.
    pub index: usize,
    /// Address entries loaded from the block.
    pub entries: usize,
    /// File ids keyed by role name.
    pub files: BTreeMap<String, String>,
}

/// Reference-file dump printed by `pbr`.
#[derive(Debug, Clone, Serialize)]
pub struct PbrReport {
    /// Email linkage mode.
    pub email: Linkage,
    /// Additional-number linkage mode.
    pub anr: Linkage,
    /// Blocks in file order.
    pub blocks: Vec<BlockReport>,
}

/// Builds the reference-file report of a loaded session.
pub fn pbr_report(book: &Phonebook) -> Option<PbrReport> {
    let table = book.pbr()?;
    Some(PbrReport {
        email: table.linkage(AuxKind::Email),
        anr: table.linkage(AuxKind::Anr),
        blocks: table
            .blocks()
            .iter()
            .map(|block| BlockReport {
                index: block.index,
                entries: book.block_entry_count(block.index),
                files: block
                    .files()
                    .map(|(tag, fid)| (format!("{tag:?}").to_uppercase(), fid.to_string()))
                    .collect(),
            })
            .collect(),
    })
}
