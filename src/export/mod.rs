//! Export module for streaming bulk exports
//!
//! This module provides a crash-safe export system that:
//! - Streams records page by page to avoid memory issues with large datasets
//! - Encodes rows incrementally into a gzip-compressed CSV artifact
//! - Publishes the artifact atomically, only after the whole stream succeeded
//! - Reports the row count, size and SHA-256 digest to a notifier
//!
//! # Architecture
//!
//! The export system is built on four main components:
//!
//! 1. **PageSource**: Paginated record source, driven by a monotonic `PageCursor`
//! 2. **RecordSink**: Incremental CSV + gzip encoder over a staging file
//! 3. **ArtifactPublisher**: Renames the staging file over the per-tenant artifact and hashes it
//! 4. **CompletionNotifier**: Receives the summary of a published export
//!
//! These components are orchestrated by the **ExportPipeline**, which runs
//! each export as an independent job.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hitexport::config::ExportConfig;
//! use hitexport::export::{ExportPipeline, LogNotifier, MemorySource, Tenant};
//!
//! # async fn example() {
//! let source = Arc::new(MemorySource::new(Vec::new()));
//! let pipeline = ExportPipeline::new(source, Arc::new(LogNotifier), &ExportConfig::default());
//!
//! let outcome = pipeline.export(&Tenant::new(1, "acme"), 0).await;
//! if let Some(summary) = outcome.summary() {
//!     println!("{} rows, {} MB, {}", summary.rows, summary.size, summary.digest);
//! }
//! # }
//! ```

pub mod cursor;
pub mod flight;
pub mod notifier;
pub mod pipeline;
pub mod publisher;
pub mod record;
pub mod sink;
pub mod sources;

pub use cursor::{DEFAULT_PAGE_SIZE, Page, PageCursor, PageSource};
pub use flight::SingleFlight;
pub use notifier::{CompletionNotifier, ExportSummary, FanoutNotifier, LogNotifier, ReceiptNotifier};
pub use pipeline::{ExportOutcome, ExportPipeline, ExportState};
pub use publisher::{ArtifactPublisher, PublishedArtifact, StagedFile, format_size_mb, hash_file};
pub use record::{COLUMNS, Record, Tenant};
pub use sink::RecordSink;
pub use sources::{JsonLinesSource, MemorySource};
