//! In-memory page source

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::export::cursor::{Page, PageCursor, PageSource};
use crate::export::record::{Record, Tenant};

/// Page source over an ordered set of records held in memory.
///
/// The same records are served to every tenant.
pub struct MemorySource {
    records: Vec<Record>,
    fetches: AtomicU64,
}

impl MemorySource {
    /// Create a source; records are sorted by id
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|r| r.id);
        Self {
            records,
            fetches: AtomicU64::new(0),
        }
    }

    /// Number of `fetch_page` calls served so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl PageSource for MemorySource {
    async fn fetch_page(&self, tenant: &Tenant, cursor: PageCursor, limit: usize) -> Result<Page> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let start = self.records.partition_point(|r| r.id <= cursor.last_id());
        let records: Vec<Record> = self.records[start..].iter().take(limit).cloned().collect();

        debug!(
            tenant = %tenant.code,
            cursor = cursor.last_id(),
            fetched = records.len(),
            "Served page from memory"
        );
        Ok(Page::new(records, cursor))
    }
}
