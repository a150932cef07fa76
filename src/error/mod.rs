//! Error handling module for export operations.
//!
//! This module provides the error taxonomy shared by the whole crate:
//! - Stage-specific export failures (fetch, encode, finalize, publish, digest, notify)
//! - Configuration errors raised while loading or validating settings
//! - A single top-level error type with conversions from I/O and JSON errors
//!
//! # Example
//!
//! ```rust,no_run
//! use hitexport::error::{ExportError, HitExportError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ExportError::Fetch("connection reset".to_string()).into())
//! }
//!
//! if let Err(HitExportError::Export(e)) = example_operation() {
//!     eprintln!("{} failed: {}", e.stage(), e);
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, ExportError, HitExportError, Result};
