//! Export pipeline for streaming a tenant's records into a published artifact
//!
//! This module drives the fetch → encode loop, finalizes the staged artifact,
//! publishes it and reports the outcome. Any failure before the publish leaves
//! nothing at the artifact path and removes the staging file.
//!
//! Encoding, fsync, publish and hashing are blocking file work and run on
//! tokio's blocking pool, so exports for other tenants keep making progress.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use flate2::Compression;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::ExportConfig;
use crate::error::{ExportError, HitExportError};

use super::cursor::{DEFAULT_PAGE_SIZE, Page, PageCursor, PageSource};
use super::flight::{FlightGuard, SingleFlight};
use super::notifier::{CompletionNotifier, ExportSummary};
use super::publisher::{ArtifactPublisher, PublishedArtifact, StagedFile, format_size_mb};
use super::record::{Record, Tenant};
use super::sink::RecordSink;

/// Where a job is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Fetching,
    Encoding,
    Finalizing,
    Published,
    Aborted,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Idle => "idle",
            ExportState::Fetching => "fetching",
            ExportState::Encoding => "encoding",
            ExportState::Finalizing => "finalizing",
            ExportState::Published => "published",
            ExportState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Terminal result of an export
#[derive(Debug)]
pub enum ExportOutcome {
    /// The artifact is published and the notifier was called
    Success(ExportSummary),
    /// Nothing was published, except for a `Digest` cause
    Failed { cause: ExportError },
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Success(_))
    }

    pub fn summary(&self) -> Option<&ExportSummary> {
        match self {
            ExportOutcome::Success(summary) => Some(summary),
            ExportOutcome::Failed { .. } => None,
        }
    }

    pub fn cause(&self) -> Option<&ExportError> {
        match self {
            ExportOutcome::Success(_) => None,
            ExportOutcome::Failed { cause } => Some(cause),
        }
    }
}

/// One run of an export, owned by the pipeline for its whole life.
///
/// Holds the sink over the staging file, the cursor and the row counter.
/// Jobs are never shared; concurrent exports each have their own. The sink
/// is lent to a blocking task while a page is encoded.
struct ExportJob<S: StagedFile> {
    id: Uuid,
    tenant: Tenant,
    cursor: PageCursor,
    rows: u64,
    state: ExportState,
    staging_path: PathBuf,
    sink: Option<RecordSink<S>>,
}

impl<S: StagedFile> ExportJob<S> {
    fn open(
        tenant: Tenant,
        resume: PageCursor,
        staged: S,
        compression: Compression,
    ) -> Result<Self, ExportError> {
        let staging_path = staged.path().to_path_buf();
        let sink = RecordSink::with_compression(staged, compression)
            .map_err(|e| stage_error(e, ExportError::Encode))?;
        Ok(Self {
            id: Uuid::new_v4(),
            tenant,
            cursor: resume,
            rows: 0,
            state: ExportState::Idle,
            staging_path,
            sink: Some(sink),
        })
    }

    fn transition(&mut self, to: ExportState) {
        trace!(job = %self.id, from = %self.state, to = %to, "Export state change");
        self.state = to;
    }

    fn take_sink(&mut self) -> Result<RecordSink<S>, ExportError> {
        self.sink
            .take()
            .ok_or_else(|| ExportError::Encode("Record sink already released".to_string()))
    }
}

/// Pipeline for exporting tenants' records to published artifacts
///
/// One pipeline serves any number of tenants. Each call to
/// [`export`](Self::export) is an independent, strictly sequential job.
pub struct ExportPipeline {
    source: Arc<dyn PageSource>,
    notifier: Arc<dyn CompletionNotifier>,
    publisher: ArtifactPublisher,
    page_size: usize,
    pacing_delay: Duration,
    compression: Compression,
    flights: Option<SingleFlight>,
    cancel_token: Option<CancellationToken>,
}

impl ExportPipeline {
    /// Create a new export pipeline
    ///
    /// # Arguments
    /// * `source` - Paginated record source
    /// * `notifier` - Receives the summary of successful exports
    /// * `config` - Artifact directory, page size, pacing and compression
    pub fn new(
        source: Arc<dyn PageSource>,
        notifier: Arc<dyn CompletionNotifier>,
        config: &ExportConfig,
    ) -> Self {
        let page_size = if config.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            config.page_size
        };
        Self {
            source,
            notifier,
            publisher: ArtifactPublisher::new(config.artifact_dir.clone()),
            page_size,
            pacing_delay: config.pacing_delay(),
            compression: Compression::new(config.compression_level.min(9)),
            flights: config.single_flight.then(SingleFlight::new),
            cancel_token: None,
        }
    }

    /// Set cancellation token for exports run by this pipeline
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn publisher(&self) -> &ArtifactPublisher {
        &self.publisher
    }

    /// Export every record after `resume` for `tenant`
    ///
    /// Stages a private file in the artifact directory, streams all pages
    /// into it, then publishes it over the tenant's artifact.
    ///
    /// # Returns
    /// * `ExportOutcome` - Terminal success or failure; never partial
    pub async fn export(&self, tenant: &Tenant, resume: i64) -> ExportOutcome {
        let _flight = match self.claim(tenant) {
            Ok(guard) => guard,
            Err(cause) => return self.rejected(tenant, resume, cause),
        };
        let staged = match self.publisher.stage(tenant) {
            Ok(staged) => staged,
            Err(e) => return self.rejected(tenant, resume, stage_error(e, ExportError::Encode)),
        };
        self.run(tenant, resume, staged).await
    }

    /// Export into a caller-supplied staging file
    ///
    /// The pipeline takes ownership of `staged` and removes it on every
    /// failure path.
    pub async fn export_into<S: StagedFile>(
        &self,
        tenant: &Tenant,
        resume: i64,
        staged: S,
    ) -> ExportOutcome {
        let _flight = match self.claim(tenant) {
            Ok(guard) => guard,
            Err(cause) => {
                let _ = staged.discard();
                return self.rejected(tenant, resume, cause);
            }
        };
        if let Err(e) = tenant.validate() {
            let _ = staged.discard();
            return self.rejected(tenant, resume, stage_error(e, ExportError::InvalidTenant));
        }
        self.run(tenant, resume, staged).await
    }

    fn claim(&self, tenant: &Tenant) -> Result<Option<FlightGuard>, ExportError> {
        match &self.flights {
            None => Ok(None),
            Some(flights) => flights
                .try_acquire(&tenant.code)
                .map(Some)
                .ok_or_else(|| ExportError::AlreadyRunning {
                    tenant: tenant.code.clone(),
                }),
        }
    }

    async fn run<S: StagedFile>(&self, tenant: &Tenant, resume: i64, staged: S) -> ExportOutcome {
        let start_time = Instant::now();
        let staging_path = staged.path().to_path_buf();

        let mut job = match ExportJob::open(
            tenant.clone(),
            PageCursor::new(resume),
            staged,
            self.compression,
        ) {
            Ok(job) => job,
            Err(cause) => {
                remove_staging(&staging_path);
                return self.rejected(tenant, resume, cause);
            }
        };

        info!(
            job = %job.id,
            tenant = %tenant.code,
            last = resume,
            "Export started"
        );

        if let Err(cause) = self.drive(&mut job).await {
            return self.abort(job, cause);
        }

        let outcome = self.finish(job).await;
        if let ExportOutcome::Success(summary) = &outcome {
            info!(
                tenant = %tenant.code,
                rows = summary.rows,
                size = %summary.size,
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Export completed"
            );
        }
        outcome
    }

    /// Fetch and encode pages until the source is exhausted
    async fn drive<S: StagedFile>(&self, job: &mut ExportJob<S>) -> Result<(), ExportError> {
        let mut pages = 0u64;
        loop {
            if self.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            job.transition(ExportState::Fetching);
            let page = self
                .source
                .fetch_page(&job.tenant, job.cursor, self.page_size)
                .await
                .map_err(fetch_error)?;

            if page.is_exhausted() {
                debug!(job = %job.id, pages, rows = job.rows, "Source exhausted");
                return Ok(());
            }

            job.transition(ExportState::Encoding);
            let Page { records, cursor } = page;
            let fetched = records.len();
            let sink = job.take_sink()?;
            job.sink = Some(encode_page(sink, records).await?);
            job.rows += fetched as u64;
            job.cursor.advance(cursor);
            pages += 1;

            debug!(
                job = %job.id,
                page = pages,
                fetched,
                rows = job.rows,
                cursor = job.cursor.last_id(),
                "Wrote page"
            );

            self.pace().await;
        }
    }

    /// Pause between pages to ease load on the source
    async fn pace(&self) {
        if self.pacing_delay.is_zero() {
            return;
        }
        match &self.cancel_token {
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(self.pacing_delay) => {}
                    _ = token.cancelled() => {}
                }
            }
            None => tokio::time::sleep(self.pacing_delay).await,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Finalize, publish and announce a fully streamed job
    async fn finish<S: StagedFile>(&self, mut job: ExportJob<S>) -> ExportOutcome {
        job.transition(ExportState::Finalizing);
        let ExportJob {
            id,
            tenant,
            cursor,
            rows,
            staging_path,
            sink,
            ..
        } = job;
        let fail = |cause: ExportError| {
            remove_staging(&staging_path);
            log_failure(id, &tenant, cursor, rows, &cause);
            ExportOutcome::Failed { cause }
        };

        let Some(sink) = sink else {
            return fail(ExportError::Finalize(
                "Record sink already released".to_string(),
            ));
        };

        let publisher = self.publisher.clone();
        let target = tenant.clone();
        let sealed = tokio::task::spawn_blocking(move || seal(sink, &publisher, &target, id))
            .await
            .unwrap_or_else(|e| Err(ExportError::Finalize(format!("Finalize task failed: {}", e))));
        let Sealed {
            size_bytes,
            size,
            artifact,
        } = match sealed {
            Ok(sealed) => sealed,
            Err(cause) => return fail(cause),
        };
        trace!(job = %id, to = %ExportState::Published, "Export state change");

        let summary = ExportSummary {
            tenant: tenant.code.clone(),
            cursor: cursor.last_id(),
            rows,
            size_bytes,
            size,
            digest: artifact.digest,
            path: artifact.path,
            completed_at: Utc::now(),
        };

        if let Err(e) = self.notifier.notify(&tenant, &summary).await {
            warn!(
                job = %id,
                tenant = %tenant.code,
                cursor = summary.cursor,
                rows,
                "Failed to send completion notice: {}",
                e
            );
        }
        ExportOutcome::Success(summary)
    }

    /// Discard a job's output after a fatal error
    fn abort<S: StagedFile>(&self, mut job: ExportJob<S>, cause: ExportError) -> ExportOutcome {
        job.transition(ExportState::Aborted);
        let ExportJob {
            id,
            tenant,
            cursor,
            rows,
            staging_path,
            sink,
            ..
        } = job;
        if let Some(sink) = sink {
            sink.abort();
        }
        remove_staging(&staging_path);
        log_failure(id, &tenant, cursor, rows, &cause);
        ExportOutcome::Failed { cause }
    }

    /// Fail before a job exists
    fn rejected(&self, tenant: &Tenant, resume: i64, cause: ExportError) -> ExportOutcome {
        error!(
            tenant = %tenant.code,
            cursor = resume,
            stage = cause.stage(),
            "Export not started: {}",
            cause
        );
        ExportOutcome::Failed { cause }
    }
}

/// Write one page of records and flush it into the compressor
///
/// Runs on the blocking pool. On failure the sink is dropped there and the
/// caller only has to remove the staging file.
async fn encode_page<S: StagedFile>(
    mut sink: RecordSink<S>,
    records: Vec<Record>,
) -> Result<RecordSink<S>, ExportError> {
    tokio::task::spawn_blocking(move || {
        let written = records
            .iter()
            .try_for_each(|record| sink.write_record(record))
            .and_then(|_| sink.flush());
        match written {
            Ok(()) => Ok(sink),
            Err(e) => {
                sink.abort();
                Err(stage_error(e, ExportError::Encode))
            }
        }
    })
    .await
    .unwrap_or_else(|e| Err(ExportError::Encode(format!("Encoding task failed: {}", e))))
}

/// A published artifact with its measured size
struct Sealed {
    size_bytes: u64,
    size: String,
    artifact: PublishedArtifact,
}

/// Finalize, sync, measure, publish and hash a fully written artifact
///
/// Blocking; dropping the staged file on an early return removes it.
fn seal<S: StagedFile>(
    sink: RecordSink<S>,
    publisher: &ArtifactPublisher,
    tenant: &Tenant,
    id: Uuid,
) -> Result<Sealed, ExportError> {
    let mut staged = sink
        .finalize()
        .map_err(|e| stage_error(e, ExportError::Finalize))?;
    staged
        .sync()
        .map_err(|e| ExportError::Finalize(format!("Failed to sync staging file: {}", e)))?;

    let (size_bytes, size) = match staged.size() {
        Ok(bytes) => (bytes, format_size_mb(bytes)),
        Err(e) => {
            warn!(job = %id, tenant = %tenant.code, "Failed to stat staging file: {}", e);
            (0, "0".to_string())
        }
    };

    let artifact = publisher
        .publish(staged, tenant)
        .map_err(|e| stage_error(e, ExportError::Publish))?;
    Ok(Sealed {
        size_bytes,
        size,
        artifact,
    })
}

fn log_failure(id: Uuid, tenant: &Tenant, cursor: PageCursor, rows: u64, cause: &ExportError) {
    error!(
        job = %id,
        tenant = %tenant.code,
        cursor = cursor.last_id(),
        rows,
        stage = cause.stage(),
        published = cause.is_published(),
        "Export failed: {}",
        cause
    );
}

/// Best-effort removal of a staging file that may already be gone
fn remove_staging(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            debug!("Failed to remove staging file {}: {}", path.display(), e);
        }
    }
}

/// Keep an export error as-is, otherwise wrap it for the given stage
fn stage_error(err: HitExportError, wrap: fn(String) -> ExportError) -> ExportError {
    match err {
        HitExportError::Export(e) => e,
        other => wrap(other.to_string()),
    }
}

/// Every source failure is a fetch failure
fn fetch_error(err: HitExportError) -> ExportError {
    match err {
        HitExportError::Export(ExportError::Fetch(msg)) => ExportError::Fetch(msg),
        other => ExportError::Fetch(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_wraps_foreign_errors() {
        let io = HitExportError::Io(std::io::Error::other("connection reset"));
        match fetch_error(io) {
            ExportError::Fetch(msg) => assert!(msg.contains("connection reset")),
            other => panic!("unexpected: {other:?}"),
        }

        let encode = HitExportError::Export(ExportError::Encode("x".to_string()));
        assert!(matches!(fetch_error(encode), ExportError::Fetch(_)));
    }

    #[test]
    fn test_stage_error_keeps_export_errors() {
        let digest = HitExportError::Export(ExportError::Digest {
            path: PathBuf::from("/tmp/a"),
            message: "gone".to_string(),
        });
        assert!(stage_error(digest, ExportError::Publish).is_published());

        let other = HitExportError::Generic("boom".to_string());
        assert!(matches!(
            stage_error(other, ExportError::Publish),
            ExportError::Publish(_)
        ));
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = ExportOutcome::Failed {
            cause: ExportError::Cancelled,
        };
        assert!(!failed.is_success());
        assert!(failed.summary().is_none());
        assert!(matches!(failed.cause(), Some(ExportError::Cancelled)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ExportState::Finalizing.to_string(), "finalizing");
    }
}
