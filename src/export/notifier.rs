//! Completion notifications for finished exports
//!
//! The pipeline only calls a notifier once the artifact is published and the
//! summary is fully computed. A failing notifier never undoes a publish.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ExportError, Result};

use super::record::Tenant;

/// Everything a consumer needs to fetch and check a finished export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    /// Tenant code
    pub tenant: String,
    /// Identifier of the last exported record; resume from here next time
    pub cursor: i64,
    /// Number of data rows in the artifact
    pub rows: u64,
    /// Artifact size in bytes
    pub size_bytes: u64,
    /// Artifact size in binary megabytes, one decimal place
    pub size: String,
    /// `sha256-<hex>` digest of the artifact
    pub digest: String,
    /// Published artifact location
    pub path: PathBuf,
    /// When the artifact was published
    pub completed_at: DateTime<Utc>,
}

/// Receives the outcome of successful exports
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Announce a published export
    async fn notify(&self, tenant: &Tenant, summary: &ExportSummary) -> Result<()>;
}

/// Logs the summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn notify(&self, tenant: &Tenant, summary: &ExportSummary) -> Result<()> {
        info!(
            tenant = %tenant.code,
            cursor = summary.cursor,
            rows = summary.rows,
            size = %summary.size,
            digest = %summary.digest,
            "Export ready: {}",
            summary.path.display()
        );
        Ok(())
    }
}

/// Writes a JSON receipt next to the artifact: `{artifact}.receipt.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiptNotifier;

impl ReceiptNotifier {
    pub fn receipt_path(artifact: &std::path::Path) -> PathBuf {
        let mut name = artifact.as_os_str().to_owned();
        name.push(".receipt.json");
        PathBuf::from(name)
    }
}

#[async_trait]
impl CompletionNotifier for ReceiptNotifier {
    async fn notify(&self, _tenant: &Tenant, summary: &ExportSummary) -> Result<()> {
        let path = Self::receipt_path(&summary.path);
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&path, json).await.map_err(|e| {
            ExportError::Notify(format!("Failed to write receipt {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

/// Calls several notifiers in registration order.
///
/// Every notifier is attempted even after a failure; the first error is
/// returned.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn CompletionNotifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl CompletionNotifier for FanoutNotifier {
    async fn notify(&self, tenant: &Tenant, summary: &ExportSummary) -> Result<()> {
        let mut first = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(tenant, summary).await {
                warn!(tenant = %tenant.code, "Notifier failed: {}", e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
