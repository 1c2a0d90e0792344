#![forbid(unsafe_code)]
//! Identifiers and the crate-wide error type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Elementary file identifier as found in the reference file (2 bytes, big-endian).
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u16);

impl FileId {
    /// Decodes a big-endian file id from the first two bytes of `src`.
    pub fn from_be_slice(src: &[u8]) -> Option<Self> {
        match src {
            [hi, lo, ..] => Some(FileId(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl From<u16> for FileId {
    fn from(value: u16) -> Self {
        FileId(value)
    }
}

impl From<FileId> for u16 {
    fn from(value: FileId) -> Self {
        value.0
    }
}

/// Record geometry reported by the storage collaborator for a linear-fixed EF.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RecordSize {
    /// Bytes per record.
    pub record_len: usize,
    /// Number of records in the file.
    pub record_count: usize,
    /// Total file size in bytes.
    pub total_size: usize,
}

impl RecordSize {
    /// Builds the geometry of a file with `record_count` records of `record_len` bytes.
    pub fn new(record_len: usize, record_count: usize) -> Self {
        Self {
            record_len,
            record_count,
            total_size: record_len * record_count,
        }
    }

    /// Returns true if the 1-based record number addresses an existing record.
    pub fn contains(&self, record_number: usize) -> bool {
        (1..=self.record_count).contains(&record_number)
    }
}

/// Errors raised by the phonebook engine and its storage collaborator.
#[derive(thiserror::Error, Debug)]
pub enum SimError {
    /// Local I/O failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// The collaborator reported a failed request.
    #[error("transport: {0}")]
    Transport(String),
    /// EF_PBR held no records; loads fail until reset.
    #[error("phonebook reference file absent")]
    PbrAbsent,
    /// Block index past the reference table.
    #[error("no phonebook block {0}")]
    NoSuchBlock(usize),
    /// Global entry position past the loaded entries.
    #[error("address index {0} out of range")]
    IndexOutOfRange(usize),
    /// The block names no file for the tag.
    #[error("block {block} has no file for tag {tag:#04X}")]
    MissingFile {
        /// 0-based block index.
        block: usize,
        /// Raw EF tag byte.
        tag: u8,
    },
    /// Records needed by the operation are not in memory.
    #[error("{0} records not loaded")]
    NotLoaded(&'static str),
    /// An add found every slot occupied.
    #[error("no free auxiliary slot")]
    NoFreeSlot,
    /// A replace or delete found no slot linked to the entry.
    #[error("no linked auxiliary slot to replace")]
    NoLinkedSlot,
    /// Resolved slot beyond the file's record count.
    #[error("slot {slot} outside 1..={count}")]
    SlotOutOfRange {
        /// 1-based record number.
        slot: usize,
        /// Records in the file.
        count: usize,
    },
    /// The value does not fit the record layout or character set.
    #[error("value not encodable as {0}")]
    Unencodable(&'static str),
    /// Card data contradicts its own layout.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller passed an unusable argument.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result type for phonebook operations.
pub type Result<T> = std::result::Result<T, SimError>;
