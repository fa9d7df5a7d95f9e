//! Snapshot of the ids already persisted
//!
//! Built by a full paged scan before any write. The scan is all-or-nothing: a
//! failing page discards what was read so far.

use crate::{Result, SyncError};
use core_library::repositories::{EpisodeRepository, PageRequest};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

pub const DEFAULT_ID_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingIdIndex {
    ids: HashSet<i64>,
    page_reads: u32,
}

impl ExistingIdIndex {
    /// Scan every id in the store, `page_size` at a time
    ///
    /// Stops at the first page shorter than `page_size`, so `n` ids cost
    /// `n / page_size + 1` reads.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StoreUnavailable`] if any page read fails.
    #[instrument(skip(repo))]
    pub async fn load(repo: &dyn EpisodeRepository, page_size: u32) -> Result<Self> {
        let mut request = PageRequest::first(page_size.max(1));
        let mut ids = HashSet::new();
        let mut page_reads = 0u32;

        loop {
            let page = repo.list_id_page(request).await.map_err(|e| {
                warn!(page = request.page, error = %e, "Existing id scan failed");
                SyncError::StoreUnavailable(format!(
                    "failed to read id page {}: {}",
                    request.page, e
                ))
            })?;
            page_reads += 1;

            let len = page.len();
            ids.extend(page);
            debug!(page = request.page, rows = len, "Read id page");

            if request.is_last(len) {
                break;
            }
            request = request.next();
        }

        debug!(ids = ids.len(), page_reads, "Existing id index loaded");
        Ok(Self { ids, page_reads })
    }

    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            page_reads: 0,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of page reads the load took
    pub fn page_reads(&self) -> u32 {
        self.page_reads
    }
}
