use std::fmt;
use std::sync::Arc;

use crate::primitives::io::RecordIo;
use crate::types::FileId;

/// File id of EF_PBR under DF_PHONEBOOK.
pub const DEFAULT_PBR_FID: FileId = FileId(0x4F30);

/// Configuration options supplied when opening a [`super::Phonebook`].
#[derive(Clone)]
pub struct PhonebookOptions {
    /// The storage collaborator serving record reads and writes
    pub io: Arc<dyn RecordIo>,
    /// File id of the phonebook reference file
    pub pbr_fid: FileId,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn super::metrics::CardMetrics>>,
    /// Whether an EF_IAP store loaded for one auxiliary kind is reused by the other.
    pub share_iap_between_kinds: bool,
}

impl PhonebookOptions {
    /// Creates a new PhonebookOptions with default settings.
    pub fn new(io: Arc<dyn RecordIo>) -> Self {
        Self {
            io,
            pbr_fid: DEFAULT_PBR_FID,
            metrics: None,
            share_iap_between_kinds: true,
        }
    }

    /// Sets the reference file id.
    pub fn pbr_fid(mut self, fid: FileId) -> Self {
        self.pbr_fid = fid;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn super::metrics::CardMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables reusing one EF_IAP load for both auxiliary kinds.
    pub fn share_iap_between_kinds(mut self, enabled: bool) -> Self {
        self.share_iap_between_kinds = enabled;
        self
    }
}

impl fmt::Debug for PhonebookOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonebookOptions")
            .field("pbr_fid", &self.pbr_fid)
            .field("metrics", &self.metrics.is_some())
            .field("share_iap_between_kinds", &self.share_iap_between_kinds)
            .finish()
    }
}
