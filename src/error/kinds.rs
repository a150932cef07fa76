use std::path::PathBuf;
use std::{fmt, io};

/// Crate-wide `Result` type using [`HitExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, HitExportError>;

/// Top-level error type for hitexport operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum HitExportError {
    /// Export pipeline errors.
    Export(ExportError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// JSON encoding or decoding errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Export-specific errors.
///
/// Every variant except `Notify` is fatal to the job that raised it.
#[derive(Debug)]
pub enum ExportError {
    /// The data source failed to return a page.
    Fetch(String),

    /// The tabular or compression layer rejected bytes.
    Encode(String),

    /// Closing the compression trailer or syncing the staged file failed.
    Finalize(String),

    /// Moving the staged file to the artifact path failed.
    Publish(String),

    /// Hashing the published artifact failed. The artifact is live at `path`.
    Digest { path: PathBuf, message: String },

    /// Delivering the completion notice failed.
    Notify(String),

    /// The job was cancelled before it finished.
    Cancelled,

    /// Another export for the same tenant is still running.
    AlreadyRunning { tenant: String },

    /// The tenant code cannot be used to build an artifact path.
    InvalidTenant(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl ExportError {
    /// Whether an artifact reached its final path before this error occurred.
    ///
    /// Only a digest failure happens after the rename, so operators can tell
    /// "published but unverified" apart from "not published".
    pub fn is_published(&self) -> bool {
        matches!(self, ExportError::Digest { .. })
    }

    /// Short stable name of the failing stage, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::Fetch(_) => "fetch",
            ExportError::Encode(_) => "encode",
            ExportError::Finalize(_) => "finalize",
            ExportError::Publish(_) => "publish",
            ExportError::Digest { .. } => "digest",
            ExportError::Notify(_) => "notify",
            ExportError::Cancelled => "cancelled",
            ExportError::AlreadyRunning { .. } => "single-flight",
            ExportError::InvalidTenant(_) => "tenant",
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for HitExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitExportError::Export(e) => write!(f, "Export error: {e}"),
            HitExportError::Config(e) => write!(f, "Configuration error: {e}"),
            HitExportError::Io(e) => write!(f, "I/O error: {e}"),
            HitExportError::Json(e) => write!(f, "JSON error: {e}"),
            HitExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Fetch(msg) => write!(f, "Failed to fetch page: {msg}"),
            ExportError::Encode(msg) => write!(f, "Failed to encode rows: {msg}"),
            ExportError::Finalize(msg) => write!(f, "Failed to finalize artifact: {msg}"),
            ExportError::Publish(msg) => write!(f, "Failed to publish artifact: {msg}"),
            ExportError::Digest { path, message } => write!(
                f,
                "Artifact published at {} but could not be hashed: {message}",
                path.display()
            ),
            ExportError::Notify(msg) => write!(f, "Failed to send completion notice: {msg}"),
            ExportError::Cancelled => write!(f, "Export cancelled"),
            ExportError::AlreadyRunning { tenant } => {
                write!(f, "An export for tenant '{tenant}' is already running")
            }
            ExportError::InvalidTenant(code) => write!(f, "Invalid tenant code: '{code}'"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for HitExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HitExportError::Io(e) => Some(e),
            HitExportError::Json(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for ExportError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to HitExportError ========================= */

impl From<io::Error> for HitExportError {
    fn from(err: io::Error) -> Self {
        HitExportError::Io(err)
    }
}

impl From<serde_json::Error> for HitExportError {
    fn from(err: serde_json::Error) -> Self {
        HitExportError::Json(err)
    }
}

impl From<ExportError> for HitExportError {
    fn from(err: ExportError) -> Self {
        HitExportError::Export(err)
    }
}

impl From<ConfigError> for HitExportError {
    fn from(err: ConfigError) -> Self {
        HitExportError::Config(err)
    }
}

impl From<String> for HitExportError {
    fn from(msg: String) -> Self {
        HitExportError::Generic(msg)
    }
}

impl From<&str> for HitExportError {
    fn from(msg: &str) -> Self {
        HitExportError::Generic(msg.to_owned())
    }
}
