use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::primitives::io::CardOp;
use crate::storage::record::AuxKind;

/// Trait for tracking card traffic and phonebook edits.
///
/// Implementations receive one callback per completed storage round trip and
/// per record written by the update engine. This information can be used to
/// verify load idempotence and to monitor card wear.
pub trait CardMetrics: Send + Sync {
    /// Records a completed round trip to the storage collaborator.
    ///
    /// # Parameters
    /// * `op` - The request kind.
    /// * `ok` - Whether the collaborator reported success.
    fn round_trip(&self, op: CardOp, ok: bool);

    /// Records an auxiliary record written by an update.
    fn slot_written(&self, kind: AuxKind);

    /// Records an index-pointer record rewritten by an add or delete.
    fn iap_rewritten(&self);
}

/// A no-op implementation of [`CardMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl CardMetrics for NoopMetrics {
    fn round_trip(&self, _op: CardOp, _ok: bool) {}
    fn slot_written(&self, _kind: AuxKind) {}
    fn iap_rewritten(&self) {}
}

/// A thread-safe counter-based implementation of [`CardMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of `read_all` round trips.
    pub reads_all: AtomicU64,

    /// Number of `read_subset` round trips.
    pub reads_subset: AtomicU64,

    /// Number of `write_one` round trips.
    pub writes: AtomicU64,

    /// Number of `size_info` round trips.
    pub size_queries: AtomicU64,

    /// Number of round trips that reported failure.
    pub failures: AtomicU64,

    /// Number of email records written.
    pub email_slots_written: AtomicU64,

    /// Number of additional-number records written.
    pub anr_slots_written: AtomicU64,

    /// Number of index-pointer records rewritten.
    pub iap_rewrites: AtomicU64,
}

impl CounterMetrics {
    /// Total round trips of every kind.
    pub fn round_trips(&self) -> u64 {
        self.reads_all.load(Ordering::Relaxed)
            + self.reads_subset.load(Ordering::Relaxed)
            + self.writes.load(Ordering::Relaxed)
            + self.size_queries.load(Ordering::Relaxed)
    }
}

impl CardMetrics for CounterMetrics {
    fn round_trip(&self, op: CardOp, ok: bool) {
        let counter = match op {
            CardOp::ReadAll => &self.reads_all,
            CardOp::ReadSubset => &self.reads_subset,
            CardOp::Write => &self.writes,
            CardOp::Size => &self.size_queries,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn slot_written(&self, kind: AuxKind) {
        match kind {
            AuxKind::Email => {
                self.email_slots_written.fetch_add(1, Ordering::Relaxed);
            }
            AuxKind::Anr => {
                self.anr_slots_written.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn iap_rewritten(&self) {
        self.iap_rewrites.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`], which discards all recorded metrics.
pub fn default_metrics() -> Arc<dyn CardMetrics> {
    Arc::new(NoopMetrics)
}
