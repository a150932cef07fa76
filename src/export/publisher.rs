//! Artifact staging, atomic publishing and integrity digests
//!
//! An export is written to a private staging file in the artifact directory
//! and renamed over the per-tenant artifact path only once it is complete.
//! The rename is the single synchronization point: readers of the artifact
//! path see either the previous artifact or the new one, in full.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ExportError, Result};

use super::record::Tenant;

/// Prefix of every rendered digest.
pub const DIGEST_PREFIX: &str = "sha256-";

const HASH_CHUNK: usize = 64 * 1024;

/// A private, writable file that can later be published by rename.
///
/// Dropping a staged file without persisting it must remove it. Staged files
/// are moved into blocking tasks for encoding and publishing.
pub trait StagedFile: Write + Send + 'static {
    /// Current location of the staged file
    fn path(&self) -> &Path;

    /// Flush file contents to stable storage
    fn sync(&mut self) -> io::Result<()>;

    /// On-disk size in bytes
    fn size(&self) -> io::Result<u64>;

    /// Atomically move the file to `target`, replacing whatever is there
    ///
    /// On failure the staged file is removed.
    fn persist(self, target: &Path) -> io::Result<()>
    where
        Self: Sized;

    /// Remove the staged file
    fn discard(self) -> io::Result<()>
    where
        Self: Sized;
}

impl StagedFile for NamedTempFile {
    fn path(&self) -> &Path {
        NamedTempFile::path(self)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.as_file().sync_all()
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.as_file().metadata()?.len())
    }

    fn persist(self, target: &Path) -> io::Result<()> {
        // The returned PersistError owns the temp file; dropping it removes it
        NamedTempFile::persist(self, target)
            .map(|_| ())
            .map_err(|e| e.error)
    }

    fn discard(self) -> io::Result<()> {
        self.close()
    }
}

/// An artifact that reached its final path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub path: PathBuf,
    pub digest: String,
}

/// Publishes finished exports to their per-tenant location.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    dir: PathBuf,
}

impl ArtifactPublisher {
    /// Create a publisher rooted at `dir`
    ///
    /// Staging files are created in the same directory so the publish step is
    /// a same-filesystem rename.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic artifact location for a tenant: `{dir}/export-{code}.csv.gz`
    pub fn artifact_path(&self, tenant: &Tenant) -> PathBuf {
        self.dir.join(format!("export-{}.csv.gz", tenant.code))
    }

    /// Create a private staging file for a tenant's next export
    pub fn stage(&self, tenant: &Tenant) -> Result<NamedTempFile> {
        tenant.validate()?;
        let file = tempfile::Builder::new()
            .prefix(&format!(".export-{}-", tenant.code))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| {
                ExportError::Encode(format!(
                    "Failed to create staging file in {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
        debug!("Created staging file: {}", file.path().display());
        Ok(file)
    }

    /// Move a finished staging file over the tenant's artifact and hash it
    ///
    /// # Returns
    /// * `Result<PublishedArtifact>` - Final path and digest. A `Publish`
    ///   error means nothing changed at the artifact path; a `Digest` error
    ///   means the new artifact is live but unverified.
    pub fn publish<S: StagedFile>(&self, staged: S, tenant: &Tenant) -> Result<PublishedArtifact> {
        tenant.validate()?;
        let target = self.artifact_path(tenant);
        let from = staged.path().to_path_buf();

        staged.persist(&target).map_err(|e| {
            ExportError::Publish(format!(
                "Failed to move {} to {}: {}",
                from.display(),
                target.display(),
                e
            ))
        })?;
        info!("Published artifact: {}", target.display());

        let digest = hash_file(&target)?;
        Ok(PublishedArtifact {
            path: target,
            digest,
        })
    }

    /// Recompute the digest of the live artifact and compare it
    ///
    /// # Returns
    /// * `Result<bool>` - Whether the artifact matches `expected`
    pub fn verify(&self, tenant: &Tenant, expected: &str) -> Result<bool> {
        tenant.validate()?;
        let actual = hash_file(&self.artifact_path(tenant))?;
        Ok(actual.eq_ignore_ascii_case(expected.trim()))
    }
}

/// SHA-256 of a file, streamed in fixed-size chunks, as `sha256-<hex>`
pub fn hash_file(path: &Path) -> Result<String> {
    let digest_error = |e: io::Error| ExportError::Digest {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut file = File::open(path).map_err(digest_error)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(digest_error)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{}{}", DIGEST_PREFIX, hex::encode(hasher.finalize())))
}

/// Binary megabytes with one decimal place, e.g. `"1.5"`
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / 1024.0 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_path_is_per_tenant() {
        let publisher = ArtifactPublisher::new("/srv/exports");
        assert_eq!(
            publisher.artifact_path(&Tenant::new(1, "acme")),
            PathBuf::from("/srv/exports/export-acme.csv.gz")
        );
    }

    #[test]
    fn test_stage_lives_in_artifact_dir() {
        let dir = TempDir::new().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        let staged = publisher.stage(&Tenant::new(1, "acme")).unwrap();

        assert_eq!(staged.path().parent(), Some(dir.path()));
        let name = staged.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".export-acme-"));
    }

    #[test]
    fn test_stage_rejects_unsafe_tenant() {
        let dir = TempDir::new().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        assert!(publisher.stage(&Tenant::new(1, "../../etc")).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_publish_replaces_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        let tenant = Tenant::new(1, "acme");
        fs::write(publisher.artifact_path(&tenant), b"old").unwrap();

        let mut staged = publisher.stage(&tenant).unwrap();
        staged.write_all(b"new contents").unwrap();
        let staged_path = staged.path().to_path_buf();

        let published = publisher.publish(staged, &tenant).unwrap();
        assert_eq!(fs::read(&published.path).unwrap(), b"new contents");
        assert!(!staged_path.exists());
        assert!(published.digest.starts_with(DIGEST_PREFIX));
        assert!(publisher.verify(&tenant, &published.digest).unwrap());
        assert!(!publisher.verify(&tenant, "sha256-00").unwrap());
    }

    #[test]
    fn test_failed_publish_discards_staging_file() {
        let dir = TempDir::new().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        let tenant = Tenant::new(1, "acme");
        // A non-empty directory at the artifact path makes the rename fail
        let blocker = publisher.artifact_path(&tenant);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let staged = publisher.stage(&tenant).unwrap();
        let staged_path = staged.path().to_path_buf();

        let err = publisher.publish(staged, &tenant).unwrap_err();
        assert!(matches!(
            err,
            crate::error::HitExportError::Export(ExportError::Publish(_))
        ));
        assert!(!staged_path.exists());
        assert!(blocker.is_dir());
    }

    #[test]
    fn test_hash_file_known_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "sha256-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_missing_file_is_digest_error() {
        let err = hash_file(Path::new("/nonexistent/export.csv.gz")).unwrap_err();
        match err {
            crate::error::HitExportError::Export(e) => assert!(e.is_published()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size_mb(0), "0.0");
        assert_eq!(format_size_mb(1024 * 1024), "1.0");
        assert_eq!(format_size_mb(1536 * 1024), "1.5");
    }
}
