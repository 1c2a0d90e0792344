use serde::Serialize;

use crate::primitives::bytes::{bcd, gsm};
use crate::primitives::io::SENTINEL;
use crate::storage::pbr::EfTag;
use crate::types::{FileId, Result, SimError};

/// Trailing bytes of an ADN record after the alpha identifier.
pub const ADN_FOOTER_LEN: usize = 14;
const ADN_BCD_LEN: usize = 0;
const ADN_EXT_RECORD: usize = 13;

const EXT_TYPE_ADDITIONAL_DATA: u8 = 0x02;
const EXT_DATA_LEN: usize = 1;
const EXT_DATA: usize = 2;
const EXT_NEXT_RECORD: usize = 12;

/// Trailing linkage bytes of an email record (ADN SFI, ADN record id).
pub const EMAIL_SUFFIX_LEN: usize = 2;

pub mod anr {
    //! Byte offsets inside an additional-number record.

    #![allow(missing_docs)]

    pub const DESCRIPTION: usize = 0;
    pub const BCD_LEN: usize = 1;
    pub const TON_NPI: usize = 2;
    pub const CAPABILITY: usize = 13;
    pub const EXTENSION: usize = 14;
    pub const ADN_SFI: usize = 15;
    pub const ADN_RECORD_ID: usize = 16;
    /// Shortest record holding description, number, capability and extension.
    pub const MIN_LEN: usize = 15;
}

/// Auxiliary field kinds attached to an address entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum AuxKind {
    /// EF_EMAIL.
    Email,
    /// EF_ANR.
    Anr,
}

impl AuxKind {
    /// Both kinds in load order.
    pub const ALL: [AuxKind; 2] = [AuxKind::Email, AuxKind::Anr];

    /// Reference-file tag of the backing EF.
    pub fn tag(self) -> EfTag {
        match self {
            AuxKind::Email => EfTag::Email,
            AuxKind::Anr => EfTag::Anr,
        }
    }

    /// Short name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            AuxKind::Email => "email",
            AuxKind::Anr => "additional number",
        }
    }

    /// Decodes the value held by a raw record; empty when the record is unused.
    pub fn decode(self, raw: &[u8]) -> String {
        match self {
            AuxKind::Email => decode_email(raw),
            AuxKind::Anr => decode_anr(raw),
        }
    }

    /// Builds a `record_len` record holding `value` (all sentinel when `value` is empty).
    ///
    /// `back_ref` is the 1-based ADN record the value belongs to; it is only
    /// stored by index-pointer linked files.
    pub fn encode(self, record_len: usize, value: &str, back_ref: Option<u8>) -> Result<Vec<u8>> {
        match self {
            AuxKind::Email => encode_email(record_len, value, back_ref),
            AuxKind::Anr => encode_anr(record_len, value, back_ref),
        }
    }
}

/// Returns true if every byte of `raw` is the sentinel.
pub fn is_sentinel(raw: &[u8]) -> bool {
    raw.iter().all(|b| *b == SENTINEL)
}

/// Email text: the alpha field minus the linkage suffix.
pub fn decode_email(raw: &[u8]) -> String {
    match raw.len().checked_sub(EMAIL_SUFFIX_LEN) {
        Some(end) if end > 0 => gsm::decode_alpha(&raw[..end]),
        _ => String::new(),
    }
}

/// Email record of `record_len` bytes; the back reference goes in the last byte.
pub fn encode_email(record_len: usize, value: &str, back_ref: Option<u8>) -> Result<Vec<u8>> {
    let mut data = vec![SENTINEL; record_len];
    if value.is_empty() {
        return Ok(data);
    }
    let text = gsm::encode_unpacked(value);
    if text.len() > record_len.saturating_sub(EMAIL_SUFFIX_LEN) {
        return Err(SimError::Unencodable("email"));
    }
    data[..text.len()].copy_from_slice(&text);
    if let Some(adn_record) = back_ref {
        data[record_len - 1] = adn_record;
    }
    Ok(data)
}

/// Additional number with dialing separators shown as `P` (pause) and `W` (wait).
pub fn decode_anr(raw: &[u8]) -> String {
    bcd::decode_number_field(raw, anr::BCD_LEN)
        .chars()
        .map(|c| match c {
            bcd::PAUSE => 'P',
            bcd::WAIT => 'W',
            other => other,
        })
        .collect()
}

/// Additional-number record; `P`/`W` (either case) become pause and wait digits.
pub fn encode_anr(record_len: usize, value: &str, back_ref: Option<u8>) -> Result<Vec<u8>> {
    let mut data = vec![SENTINEL; record_len];
    if value.is_empty() {
        return Ok(data);
    }
    if record_len < anr::MIN_LEN {
        return Err(SimError::Invalid("additional number record too short"));
    }
    let dialable: String = value
        .chars()
        .map(|c| match c {
            'P' | 'p' => bcd::PAUSE,
            'W' | 'w' => bcd::WAIT,
            other => other,
        })
        .collect();
    let number = bcd::encode_called_party(&dialable)
        .filter(|n| n.len() <= bcd::MAX_NUMBER_BYTES)
        .ok_or(SimError::Unencodable("additional number"))?;
    data[anr::DESCRIPTION] = 0x00;
    data[anr::BCD_LEN] = number.len() as u8;
    data[anr::TON_NPI..anr::TON_NPI + number.len()].copy_from_slice(&number);
    data[anr::CAPABILITY] = SENTINEL;
    data[anr::EXTENSION] = SENTINEL;
    if let Some(adn_record) = back_ref {
        if record_len > anr::ADN_RECORD_ID {
            data[anr::ADN_RECORD_ID] = adn_record;
        }
    }
    Ok(data)
}

/// One normalized phonebook contact.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AdnRecord {
    /// Display name.
    pub alpha: String,
    /// Dialing number.
    pub number: String,
    /// Attached email addresses.
    pub emails: Vec<String>,
    /// Attached additional numbers.
    pub additional_numbers: Vec<String>,
    /// EF the entry was read from.
    pub ef_id: FileId,
    /// 1-based record number inside `ef_id`.
    pub record_number: usize,
    #[serde(skip)]
    ext_record: Option<u8>,
}

impl AdnRecord {
    /// Decodes one raw ADN record. Records too short to hold the footer decode as empty.
    pub fn decode(ef_id: FileId, record_number: usize, raw: &[u8]) -> Self {
        let mut rec = AdnRecord {
            ef_id,
            record_number,
            ..Default::default()
        };
        let Some(footer) = raw.len().checked_sub(ADN_FOOTER_LEN) else {
            return rec;
        };
        rec.alpha = gsm::decode_alpha(&raw[..footer]).trim_end().to_string();
        rec.number = bcd::decode_number_field(raw, footer + ADN_BCD_LEN);
        rec.ext_record = match raw[footer + ADN_EXT_RECORD] {
            0x00 | SENTINEL => None,
            id => Some(id),
        };
        rec
    }

    /// True when the entry carries neither name nor number.
    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty() && self.number.is_empty()
    }

    /// Extension record holding the overflow of the dialing number, if any.
    pub fn ext_record(&self) -> Option<u8> {
        self.ext_record
    }

    /// Values of the given auxiliary kind.
    pub fn values(&self, kind: AuxKind) -> &[String] {
        match kind {
            AuxKind::Email => &self.emails,
            AuxKind::Anr => &self.additional_numbers,
        }
    }

    /// Replaces the values of the given auxiliary kind.
    pub fn set_values(&mut self, kind: AuxKind, values: Vec<String>) {
        *self.values_mut(kind) = values;
    }

    pub(crate) fn values_mut(&mut self, kind: AuxKind) -> &mut Vec<String> {
        match kind {
            AuxKind::Email => &mut self.emails,
            AuxKind::Anr => &mut self.additional_numbers,
        }
    }

    /// Appends the digits chained from `ext_records` (1-based ids) to the number.
    pub fn append_extension(&mut self, ext_records: &[Vec<u8>]) {
        let mut next = self.ext_record;
        let mut hops = 0;
        while let Some(id) = next {
            hops += 1;
            if hops > ext_records.len() {
                break;
            }
            let Some(raw) = ext_records.get(id as usize - 1) else {
                break;
            };
            if raw.first() != Some(&EXT_TYPE_ADDITIONAL_DATA) {
                break;
            }
            let len = raw.get(EXT_DATA_LEN).copied().unwrap_or(0) as usize;
            if let Some(digits) = raw.get(EXT_DATA..EXT_DATA + len) {
                self.number.push_str(&bcd::decode_digits(digits));
            }
            next = match raw.get(EXT_NEXT_RECORD).copied() {
                None | Some(0x00) | Some(SENTINEL) => None,
                Some(id) => Some(id),
            };
        }
    }
}

/// Raw records of one auxiliary EF for one block, with their occupancy flags.
///
/// `flags[i]` is true while slot `i + 1` holds live data. The flag is set by
/// the join when a value is attached and recomputed from the bytes on every write.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuxStore {
    records: Vec<Vec<u8>>,
    flags: Vec<bool>,
}

impl AuxStore {
    /// Wraps freshly loaded records; every slot starts free.
    pub fn new(records: Vec<Vec<u8>>) -> Self {
        let flags = vec![false; records.len()];
        Self { records, flags }
    }

    /// Number of records read from the card.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the file holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw bytes of the record at 0-based `index`.
    pub fn record(&self, index: usize) -> Option<&[u8]> {
        self.records.get(index).map(Vec::as_slice)
    }

    /// All raw records.
    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }

    /// Occupancy flags, one per record.
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    /// Number of slots whose flag is clear.
    pub fn free_slots(&self) -> usize {
        self.flags.iter().filter(|used| !**used).count()
    }

    /// Index of the first free slot.
    pub fn first_free(&self) -> Option<usize> {
        self.flags.iter().position(|used| !*used)
    }

    pub(crate) fn mark_used(&mut self, index: usize) {
        if let Some(flag) = self.flags.get_mut(index) {
            *flag = true;
        }
    }

    pub(crate) fn clear_flags(&mut self) {
        self.flags.iter_mut().for_each(|f| *f = false);
    }

    /// Stores a written record and derives its flag from the bytes.
    pub(crate) fn put(&mut self, index: usize, data: Vec<u8>) {
        if index >= self.records.len() {
            self.records.resize(index + 1, vec![SENTINEL; data.len()]);
            self.flags.resize(index + 1, false);
        }
        self.flags[index] = !is_sentinel(&data);
        self.records[index] = data;
    }
}
