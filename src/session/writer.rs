//! Writers that persist session data to the output sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::session::Sample;

/// Errors raised while persisting session output.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Output sink i/o failure.
    #[error("session output i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Sample buffer serialization failure.
    #[error("session serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Batch-mode session writer.
///
/// Holds only the destination path; the file is created, written and released
/// inside a single [`write_batch`](Self::write_batch) call, so no handle
/// outlives the flush.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    path: PathBuf,
}

impl SessionWriter {
    /// Create a writer targeting `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination path of the session document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the whole sample buffer as one pretty-printed JSON array.
    ///
    /// An empty buffer still produces a valid `[]` document; callers rely on
    /// the output file existing after every session, however short.
    pub fn write_batch(&self, samples: &[Sample]) -> Result<(), SessionError> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, samples)?;
        writer.flush()?;
        Ok(())
    }
}

/// Streaming-mode session sink.
///
/// Each parsed record is appended as one line. The file is created (or
/// truncated) when the sink is opened and released when the sink drops;
/// [`finish`](Self::finish) flushes buffered records first.
#[derive(Debug)]
pub struct LineSink {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
}

impl LineSink {
    /// Create or truncate the sink file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Destination path of the record log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one already-parsed record as a line.
    pub fn append(&mut self, record: &str) -> Result<(), SessionError> {
        writeln!(self.writer, "{record}")?;
        self.records += 1;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush buffered records and release the sink.
    pub fn finish(mut self) -> Result<(), SessionError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Sample;
    use chrono::Utc;

    #[test]
    fn test_write_batch_empty_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");

        let writer = SessionWriter::new(&path);
        writer.write_batch(&[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, serde_json::json!([]));
    }

    #[test]
    fn test_write_batch_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");

        let samples: Vec<Sample> = (0..4).map(|i| Sample::at(Utc::now(), i.to_string())).collect();
        SessionWriter::new(&path).write_batch(&samples).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 4);
        for (i, record) in parsed.iter().enumerate() {
            assert_eq!(record["payload"], i.to_string());
            assert!(record["ts"].is_string());
        }
    }

    #[test]
    fn test_write_batch_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        let writer = SessionWriter::new(&path);

        writer
            .write_batch(&[Sample::now("first"), Sample::now("second")])
            .unwrap();
        writer.write_batch(&[Sample::now("only")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["payload"], "only");
    }

    #[test]
    fn test_line_sink_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");

        let mut sink = LineSink::create(&path).unwrap();
        sink.append("cpu_frequency: state=1200000 cpu_id=0").unwrap();
        sink.append("thermal_temp: temp=41000").unwrap();
        assert_eq!(sink.records_written(), 2);
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cpu_frequency:"));
    }

    #[test]
    fn test_line_sink_truncates_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");
        std::fs::write(&path, "stale contents\n").unwrap();

        let sink = LineSink::create(&path).unwrap();
        sink.finish().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
