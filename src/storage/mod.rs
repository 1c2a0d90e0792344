//! Phonebook engine over linear-fixed elementary files.
//!
//! Parses the reference file, loads and joins the address and auxiliary
//! records of every block, and applies single-field edits back to the card.

/// Reference file (EF_PBR) decoding.
///
/// Block table and the card-wide linkage mode of each auxiliary kind.
pub mod pbr;

/// On-card record layouts.
///
/// Address, email and additional-number records plus the per-block auxiliary stores.
pub mod record;

mod metrics;
mod options;
mod phonebook;

/// Metrics hooks.
pub use metrics::{default_metrics, CardMetrics, CounterMetrics, NoopMetrics};

/// Phonebook configuration options.
pub use options::{PhonebookOptions, DEFAULT_PBR_FID};

/// Phonebook session and capacity sentinel.
pub use phonebook::{Phonebook, UNBOUNDED};

pub use pbr::{Block, EfTag, Linkage, PbrTable};
pub use record::{AdnRecord, AuxKind, AuxStore};
