//! Streaming CSV + gzip encoder for export artifacts
//!
//! Records go through a `csv::Writer` into a gzip stream that wraps the
//! destination. Nothing is held beyond the csv and deflate buffers, so memory
//! stays bounded however long the stream is.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::error::{ExportError, Result};

use super::record::{COLUMNS, Record};

/// Incremental encoder that turns records into a compressed tabular stream.
///
/// The header row is written once, at open time. Rows are buffered until
/// [`flush`](Self::flush); the stream is only valid for decompression after
/// [`finalize`](Self::finalize).
pub struct RecordSink<W: Write> {
    writer: csv::Writer<GzEncoder<W>>,
    written: u64,
}

impl<W: Write> RecordSink<W> {
    /// Open a sink with the default compression level
    pub fn open(destination: W) -> Result<Self> {
        Self::with_compression(destination, Compression::default())
    }

    /// Open a sink with an explicit gzip level
    ///
    /// # Arguments
    /// * `destination` - Where the compressed bytes go
    /// * `level` - Gzip compression level
    ///
    /// # Returns
    /// * `Result<Self>` - Sink with the header row already written
    pub fn with_compression(destination: W, level: Compression) -> Result<Self> {
        let encoder = GzEncoder::new(destination, level);
        let mut writer = csv::Writer::from_writer(encoder);
        writer
            .write_record(COLUMNS)
            .map_err(|e| ExportError::Encode(format!("Failed to write header: {}", e)))?;

        debug!("Opened record sink (gzip level {})", level.level());
        Ok(Self { writer, written: 0 })
    }

    /// Append one row
    ///
    /// Bytes are buffered; they are not durable until the next flush.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.writer
            .write_record(record.to_row())
            .map_err(|e| ExportError::Encode(format!("Failed to write row {}: {}", record.id, e)))?;
        self.written += 1;
        Ok(())
    }

    /// Push buffered rows through the csv layer into the compressor
    ///
    /// Surfaces any write fault from the destination, so callers can fail
    /// after each page instead of at the end of the stream.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| ExportError::Encode(format!("Failed to flush rows: {}", e)))?;
        Ok(())
    }

    /// Close the compression layer and hand back the destination
    ///
    /// Writes the gzip trailer. Must be the last operation on the sink.
    pub fn finalize(self) -> Result<W> {
        let written = self.written;
        let encoder = self.writer.into_inner().map_err(|e| {
            ExportError::Finalize(format!("Failed to flush csv buffer: {}", e.error()))
        })?;
        let destination = encoder
            .finish()
            .map_err(|e| ExportError::Finalize(format!("Failed to write gzip trailer: {}", e)))?;

        debug!("Finalized record sink ({} rows)", written);
        Ok(destination)
    }

    /// Drop every layer without reporting errors
    ///
    /// Used on failure paths only. The layers flush on drop and any error
    /// from that is ignored; the output must be discarded by the caller.
    pub fn abort(self) {
        debug!("Aborted record sink after {} rows", self.written);
        drop(self.writer);
    }

    /// Number of data rows accepted so far
    pub fn rows_written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use flate2::read::GzDecoder;
    use std::io;

    /// Accepts `budget` bytes, then fails every write
    #[derive(Debug)]
    struct FaultyWriter {
        budget: usize,
        data: Vec<u8>,
    }

    impl Write for FaultyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(id: i64, screen: Option<(f64, f64)>) -> Record {
        Record {
            id,
            path: format!("/p/{id}"),
            title: "Quote \"me\", please".to_string(),
            event: id % 2 == 0,
            bot: 3,
            session: 900 + id as u64,
            referrer: String::new(),
            browser: "Chrome/120".to_string(),
            screen_size: screen,
            location: "US-CA".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
        }
    }

    fn decode(bytes: &[u8]) -> Vec<csv::StringRecord> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(GzDecoder::new(bytes));
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_header_and_rows_round_trip() {
        let records = vec![record(1, Some((1920.0, 1080.0))), record(2, None)];

        let mut sink = RecordSink::open(Vec::new()).unwrap();
        for r in &records {
            sink.write_record(r).unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(sink.rows_written(), 2);
        let bytes = sink.finalize().unwrap();

        let rows = decode(&bytes);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].iter().collect::<Vec<_>>(), COLUMNS.to_vec());
        for (row, r) in rows[1..].iter().zip(&records) {
            assert_eq!(row.iter().collect::<Vec<_>>(), r.to_row().to_vec());
        }
        assert_eq!(&rows[1][7], "1920,1080");
        assert_eq!(&rows[2][7], "");
        assert_eq!(&rows[1][2], "false");
        assert_eq!(&rows[2][2], "true");
        assert_eq!(&rows[1][1], "Quote \"me\", please");
    }

    #[test]
    fn test_header_only_stream_is_valid() {
        let sink = RecordSink::open(Vec::new()).unwrap();
        let bytes = sink.finalize().unwrap();
        let rows = decode(&bytes);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Path");
    }

    #[test]
    fn test_flush_surfaces_write_fault() {
        let dest = FaultyWriter {
            budget: 0,
            data: Vec::new(),
        };
        let mut sink = RecordSink::open(dest).unwrap();
        sink.write_record(&record(1, None)).unwrap();

        let err = sink.flush().unwrap_err();
        assert!(matches!(
            err,
            crate::error::HitExportError::Export(ExportError::Encode(_))
        ));
    }

    #[test]
    fn test_finalize_surfaces_trailer_fault() {
        // Enough for the gzip header, not for the compressed body and trailer
        let dest = FaultyWriter {
            budget: 10,
            data: Vec::new(),
        };
        let mut sink = RecordSink::with_compression(dest, Compression::none()).unwrap();
        sink.write_record(&record(1, None)).unwrap();

        let err = sink.finalize().unwrap_err();
        assert!(matches!(
            err,
            crate::error::HitExportError::Export(ExportError::Finalize(_))
        ));
    }

    #[test]
    fn test_abort_does_not_panic_on_faulty_destination() {
        let dest = FaultyWriter {
            budget: 0,
            data: Vec::new(),
        };
        let mut sink = RecordSink::open(dest).unwrap();
        sink.write_record(&record(1, None)).unwrap();
        sink.abort();
    }
}
