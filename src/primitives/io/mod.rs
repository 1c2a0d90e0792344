#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::concurrency::{pending, Completer, Pending};
use crate::types::{FileId, RecordSize, Result, SimError};

/// Fill byte of an unused record.
pub const SENTINEL: u8 = 0xFF;

/// Asynchronous record access to linear-fixed elementary files.
///
/// Record numbers are 1-based as on the card. Every call returns at once with
/// a ticket; the outcome is delivered exactly once, possibly from another thread.
pub trait RecordIo: Send + Sync + 'static {
    /// Reads every record of `fid`.
    fn read_all(&self, fid: FileId) -> Pending<Vec<Vec<u8>>>;
    /// Reads the listed records of `fid`, in the given order.
    fn read_subset(&self, fid: FileId, record_numbers: &[usize]) -> Pending<Vec<Vec<u8>>>;
    /// Overwrites record `record_number` of `fid` with `data`.
    fn write_one(&self, fid: FileId, record_number: usize, data: Vec<u8>) -> Pending<()>;
    /// Reports the record length and count of `fid`.
    fn size_info(&self, fid: FileId) -> Pending<RecordSize>;
}

/// Request kinds, used to target injected failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CardOp {
    /// [`RecordIo::read_all`].
    ReadAll,
    /// [`RecordIo::read_subset`].
    ReadSubset,
    /// [`RecordIo::write_one`].
    Write,
    /// [`RecordIo::size_info`].
    Size,
}

/// One linear-fixed EF held in memory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinearFixed {
    /// Bytes per record.
    pub record_len: usize,
    /// Record bodies, each exactly `record_len` bytes.
    pub records: Vec<Vec<u8>>,
}

impl LinearFixed {
    /// Builds a file, padding or truncating every record to `record_len`.
    pub fn new(record_len: usize, records: Vec<Vec<u8>>) -> Self {
        let records = records
            .into_iter()
            .map(|mut rec| {
                rec.resize(record_len, SENTINEL);
                rec
            })
            .collect();
        Self {
            record_len,
            records,
        }
    }

    /// A file of `count` sentinel-filled records.
    pub fn empty(record_len: usize, count: usize) -> Self {
        Self {
            record_len,
            records: vec![vec![SENTINEL; record_len]; count],
        }
    }

    fn size(&self) -> RecordSize {
        RecordSize::new(self.record_len, self.records.len())
    }
}

/// Serializable card contents: file ids as 4-digit hex, records as hex strings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardImage {
    /// Files keyed by hex file id (e.g. `"6F3A"`).
    pub files: BTreeMap<String, EfImage>,
}

/// Serializable form of a [`LinearFixed`] file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EfImage {
    /// Bytes per record.
    pub record_len: usize,
    /// Hex-encoded records; short records are padded with `FF`.
    pub records: Vec<String>,
}

enum Request {
    ReadAll(FileId, Completer<Vec<Vec<u8>>>),
    ReadSubset(FileId, Vec<usize>, Completer<Vec<Vec<u8>>>),
    Write(FileId, usize, Vec<u8>, Completer<()>),
    Size(FileId, Completer<RecordSize>),
}

#[derive(Default)]
struct CardState {
    files: Mutex<BTreeMap<FileId, LinearFixed>>,
    faults: Mutex<Vec<(CardOp, FileId)>>,
    requests: AtomicU64,
}

impl CardState {
    fn take_fault(&self, op: CardOp, fid: FileId) -> Option<SimError> {
        let mut faults = self.faults.lock();
        let pos = faults.iter().position(|f| *f == (op, fid))?;
        faults.remove(pos);
        Some(SimError::Transport(format!("injected {op:?} failure on {fid}")))
    }

    fn with_file<T>(
        &self,
        op: CardOp,
        fid: FileId,
        f: impl FnOnce(&mut LinearFixed) -> Result<T>,
    ) -> Result<T> {
        if let Some(err) = self.take_fault(op, fid) {
            return Err(err);
        }
        let mut files = self.files.lock();
        let file = files
            .get_mut(&fid)
            .ok_or_else(|| SimError::Transport(format!("file {fid} not found")))?;
        f(file)
    }

    fn serve(&self, request: Request) {
        match request {
            Request::ReadAll(fid, done) => {
                let outcome = self.with_file(CardOp::ReadAll, fid, |file| Ok(file.records.clone()));
                debug!(%fid, ok = outcome.is_ok(), "card.read_all");
                done.complete(outcome);
            }
            Request::ReadSubset(fid, numbers, done) => {
                let outcome = self.with_file(CardOp::ReadSubset, fid, |file| {
                    Ok(numbers
                        .iter()
                        .filter_map(|n| n.checked_sub(1).and_then(|i| file.records.get(i)))
                        .cloned()
                        .collect())
                });
                debug!(%fid, wanted = numbers.len(), ok = outcome.is_ok(), "card.read_subset");
                done.complete(outcome);
            }
            Request::Write(fid, number, data, done) => {
                let outcome = self.with_file(CardOp::Write, fid, |file| {
                    if data.len() != file.record_len {
                        return Err(SimError::Transport("record length mismatch".into()));
                    }
                    let slot = number
                        .checked_sub(1)
                        .and_then(|i| file.records.get_mut(i))
                        .ok_or_else(|| {
                            SimError::Transport(format!("record {number} out of range"))
                        })?;
                    *slot = data;
                    Ok(())
                });
                debug!(%fid, number, ok = outcome.is_ok(), "card.write_one");
                done.complete(outcome);
            }
            Request::Size(fid, done) => {
                let outcome = self.with_file(CardOp::Size, fid, |file| Ok(file.size()));
                debug!(%fid, ok = outcome.is_ok(), "card.size_info");
                done.complete(outcome);
            }
        }
    }
}

/// In-memory card whose requests are serviced by a background worker thread.
pub struct MemCard {
    state: Arc<CardState>,
    sender: Mutex<Option<Sender<Request>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl MemCard {
    /// Creates an empty card and starts its worker.
    pub fn new() -> Self {
        let state = Arc::new(CardState::default());
        let (sender, receiver): (Sender<Request>, Receiver<Request>) = mpsc::channel();
        let worker_state = Arc::clone(&state);
        let worker = thread::spawn(move || {
            for request in receiver {
                worker_state.serve(request);
            }
            debug!("card.worker_exit");
        });
        Self {
            state,
            sender: Mutex::new(Some(sender)),
            worker: Some(worker),
        }
    }

    /// Builds a card from a serialized image.
    pub fn from_image(image: &CardImage) -> Result<Self> {
        let card = Self::new();
        for (key, ef) in &image.files {
            let fid = u16::from_str_radix(key, 16)
                .map_err(|_| SimError::Invalid("file id is not hex"))?;
            let records = ef
                .records
                .iter()
                .map(|rec| hex::decode(rec).map_err(|_| SimError::Invalid("record is not hex")))
                .collect::<Result<Vec<_>>>()?;
            card.insert_file(FileId(fid), LinearFixed::new(ef.record_len, records));
        }
        Ok(card)
    }

    /// Serializes the current card contents.
    pub fn to_image(&self) -> CardImage {
        let files = self.state.files.lock();
        CardImage {
            files: files
                .iter()
                .map(|(fid, file)| {
                    (
                        fid.to_string(),
                        EfImage {
                            record_len: file.record_len,
                            records: file.records.iter().map(hex::encode_upper).collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Adds or replaces a file.
    pub fn insert_file(&self, fid: FileId, file: LinearFixed) {
        self.state.files.lock().insert(fid, file);
    }

    /// Returns a copy of record `record_number` (1-based) of `fid`.
    pub fn record(&self, fid: FileId, record_number: usize) -> Option<Vec<u8>> {
        let files = self.state.files.lock();
        let file = files.get(&fid)?;
        file.records.get(record_number.checked_sub(1)?).cloned()
    }

    /// Fails the next `op` request against `fid`.
    pub fn fail_next(&self, op: CardOp, fid: FileId) {
        self.state.faults.lock().push((op, fid));
    }

    /// Total number of requests submitted so far.
    pub fn request_count(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }

    fn submit<T>(&self, request: Request, ticket: Pending<T>) -> Pending<T> {
        self.state.requests.fetch_add(1, Ordering::Relaxed);
        if let Some(sender) = self.sender.lock().as_ref() {
            // A send error drops the request, and with it the completer, which
            // fails the ticket.
            let _ = sender.send(request);
        }
        ticket
    }
}

impl Default for MemCard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemCard")
            .field("files", &self.state.files.lock().len())
            .field("requests", &self.request_count())
            .finish()
    }
}

impl Drop for MemCard {
    fn drop(&mut self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl RecordIo for MemCard {
    fn read_all(&self, fid: FileId) -> Pending<Vec<Vec<u8>>> {
        let (done, ticket) = pending();
        self.submit(Request::ReadAll(fid, done), ticket)
    }

    fn read_subset(&self, fid: FileId, record_numbers: &[usize]) -> Pending<Vec<Vec<u8>>> {
        let (done, ticket) = pending();
        self.submit(
            Request::ReadSubset(fid, record_numbers.to_vec(), done),
            ticket,
        )
    }

    fn write_one(&self, fid: FileId, record_number: usize, data: Vec<u8>) -> Pending<()> {
        let (done, ticket) = pending();
        self.submit(Request::Write(fid, record_number, data, done), ticket)
    }

    fn size_info(&self, fid: FileId) -> Pending<RecordSize> {
        let (done, ticket) = pending();
        self.submit(Request::Size(fid, done), ticket)
    }
}
