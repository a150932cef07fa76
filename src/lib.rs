//! hitexport library
//!
//! Streaming bulk export of per-tenant analytics records into
//! gzip-compressed CSV artifacts, published atomically with a SHA-256 digest.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Page sources, the export pipeline, publishing and notifiers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hitexport::config::Config;
//! use hitexport::export::{ExportPipeline, JsonLinesSource, LogNotifier, Tenant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_from_file(None)?;
//!     let pipeline = ExportPipeline::new(
//!         Arc::new(JsonLinesSource::new("hits.jsonl")),
//!         Arc::new(LogNotifier),
//!         &config.export,
//!     );
//!
//!     let outcome = pipeline.export(&Tenant::new(1, "acme"), 0).await;
//!     println!("success: {}", outcome.is_success());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, HitExportError, Result};
pub use export::{ExportOutcome, ExportPipeline, ExportSummary, Record, Tenant};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
