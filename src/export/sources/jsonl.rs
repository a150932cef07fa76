//! JSON Lines page source
//!
//! Reads one JSON-encoded [`Record`] per line, lazily, one page at a time.
//! The file must be sorted by ascending id.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::export::cursor::{Page, PageCursor, PageSource};
use crate::export::record::{Record, Tenant};

/// Read position inside the file
#[derive(Default)]
struct ReadState {
    lines: Option<Lines<BufReader<File>>>,
    /// 1-based number of the last line read
    line_no: usize,
    /// Id of the last record read from the file
    last_id: Option<i64>,
    eof: bool,
}

/// Page source backed by a JSON Lines file
pub struct JsonLinesSource {
    path: PathBuf,
    state: Mutex<ReadState>,
}

impl JsonLinesSource {
    /// Create a source for the given file
    ///
    /// The file is opened on the first fetch.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(ReadState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<ReadState> {
        let file = File::open(&self.path).await.map_err(|e| {
            ExportError::Fetch(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        debug!("Opened JSON Lines source: {}", self.path.display());
        Ok(ReadState {
            lines: Some(BufReader::new(file).lines()),
            ..ReadState::default()
        })
    }
}

#[async_trait]
impl PageSource for JsonLinesSource {
    async fn fetch_page(&self, tenant: &Tenant, cursor: PageCursor, limit: usize) -> Result<Page> {
        let mut state = self.state.lock().await;

        // Asked for records we have already read past: start over
        let rewind = state.last_id.is_some_and(|last| cursor.last_id() < last);
        if (state.lines.is_none() && !state.eof) || rewind {
            *state = self.open().await?;
        }

        let mut records = Vec::with_capacity(limit.min(4096));
        while records.len() < limit && !state.eof {
            let Some(lines) = state.lines.as_mut() else {
                break;
            };
            let line = lines.next_line().await.map_err(|e| {
                ExportError::Fetch(format!("Failed to read {}: {}", self.path.display(), e))
            })?;
            let Some(line) = line else {
                state.eof = true;
                state.lines = None;
                break;
            };
            state.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(&line).map_err(|e| {
                ExportError::Fetch(format!("Invalid record on line {}: {}", state.line_no, e))
            })?;
            if let Some(last) = state.last_id {
                if record.id <= last {
                    return Err(ExportError::Fetch(format!(
                        "Record ids must be ascending: line {} has id {} after id {}",
                        state.line_no, record.id, last
                    ))
                    .into());
                }
            }
            state.last_id = Some(record.id);

            if record.id > cursor.last_id() {
                records.push(record);
            }
        }

        debug!(
            tenant = %tenant.code,
            cursor = cursor.last_id(),
            fetched = records.len(),
            line = state.line_no,
            "Read page from JSON Lines"
        );
        Ok(Page::new(records, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn line(id: i64) -> String {
        format!(
            r#"{{"id": {id}, "path": "/p/{id}", "created_at": "2024-01-01T00:00:00Z"}}"#
        )
    }

    fn write_lines(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(file, "{l}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.records.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_reads_in_pages_until_exhausted() {
        let file = write_lines(&[line(1), line(2), String::new(), line(4), line(8), line(9)]);
        let source = JsonLinesSource::new(file.path());
        let tenant = Tenant::new(1, "t");

        let page = source.fetch_page(&tenant, PageCursor::new(0), 2).await.unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
        let page = source.fetch_page(&tenant, page.cursor, 2).await.unwrap();
        assert_eq!(ids(&page), vec![4, 8]);
        let page = source.fetch_page(&tenant, page.cursor, 2).await.unwrap();
        assert_eq!(ids(&page), vec![9]);
        let page = source.fetch_page(&tenant, page.cursor, 2).await.unwrap();
        assert!(page.is_exhausted());
        assert_eq!(page.cursor, PageCursor::new(9));
    }

    #[tokio::test]
    async fn test_resume_and_rewind() {
        let file = write_lines(&(1..=6).map(line).collect::<Vec<_>>());
        let source = JsonLinesSource::new(file.path());
        let tenant = Tenant::new(1, "t");

        let page = source.fetch_page(&tenant, PageCursor::new(3), 10).await.unwrap();
        assert_eq!(ids(&page), vec![4, 5, 6]);

        let page = source.fetch_page(&tenant, PageCursor::new(1), 2).await.unwrap();
        assert_eq!(ids(&page), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_out_of_order_ids_fail() {
        let file = write_lines(&[line(1), line(5), line(3)]);
        let source = JsonLinesSource::new(file.path());

        let err = source
            .fetch_page(&Tenant::new(1, "t"), PageCursor::new(0), 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[tokio::test]
    async fn test_malformed_line_reports_line_number() {
        let file = write_lines(&[line(1), "{not json".to_string()]);
        let source = JsonLinesSource::new(file.path());

        let err = source
            .fetch_page(&Tenant::new(1, "t"), PageCursor::new(0), 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let source = JsonLinesSource::new("/nonexistent/hits.jsonl");
        let err = source
            .fetch_page(&Tenant::new(1, "t"), PageCursor::new(0), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::HitExportError::Export(ExportError::Fetch(_))
        ));
    }
}
