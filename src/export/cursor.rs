//! Paging abstractions for export operations
//!
//! This module provides the cursor that bounds which records remain to be
//! fetched and the contract every paginated data source implements.

use async_trait::async_trait;

use crate::error::Result;

use super::record::{Record, Tenant};

/// Reference number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Last-seen record identifier.
///
/// Starts at a caller-supplied value (0 for a full export, or a resume point)
/// and only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageCursor(i64);

impl PageCursor {
    pub fn new(last_id: i64) -> Self {
        Self(last_id)
    }

    /// Identifier of the last record already consumed
    pub fn last_id(&self) -> i64 {
        self.0
    }

    /// Move to the position reported by a fetched page.
    ///
    /// A position behind the current one is ignored, so the cursor never
    /// decreases even if a source misbehaves.
    pub fn advance(&mut self, to: PageCursor) {
        if to.0 > self.0 {
            self.0 = to.0;
        }
    }
}

/// One bounded batch of records returned by a single fetch.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records with `id > cursor`, ascending
    pub records: Vec<Record>,
    /// Highest id in `records`, or the request cursor when empty
    pub cursor: PageCursor,
}

impl Page {
    /// Build a page from records fetched after `requested`
    ///
    /// The page cursor is the id of the last record, or `requested` for an
    /// empty page.
    pub fn new(records: Vec<Record>, requested: PageCursor) -> Self {
        let cursor = records
            .last()
            .map(|r| PageCursor::new(r.id))
            .unwrap_or(requested);
        Self { records, cursor }
    }

    /// An empty page with no error marks clean exhaustion
    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trait for paginated record sources
///
/// A fetch with cursor `C` returns only records with identifier greater than
/// `C`, in ascending order, at most `limit` of them. An empty page with no
/// error means the stream is exhausted. Errors are not retried by the
/// pipeline; retry policy, timeouts and authentication belong to the source.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the next page for `tenant` after `cursor`
    ///
    /// # Arguments
    /// * `tenant` - Tenant whose records are exported
    /// * `cursor` - Last identifier already consumed
    /// * `limit` - Maximum number of records to return
    ///
    /// # Returns
    /// * `Result<Page>` - Next page, empty when exhausted
    async fn fetch_page(&self, tenant: &Tenant, cursor: PageCursor, limit: usize) -> Result<Page>;
}
