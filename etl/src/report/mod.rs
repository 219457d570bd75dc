//! Data-quality report.
//!
//! The pipeline appends one line per fact as it goes; a [`ReportSink`]
//! receives every line produced so far once the run ends, whether or not
//! it succeeded.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Final line of a run that completed every stage.
pub const SUCCESS_LINE: &str = "ETL Pipeline completed successfully";

/// Ordered report lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append `"{label}: {count}"`.
    pub fn count(&mut self, label: &str, count: usize) {
        self.push(format!("{}: {}", label, count));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn succeeded(&self) -> bool {
        self.lines.last().map(|l| l == SUCCESS_LINE).unwrap_or(false)
    }
}

/// Destination of the finished report.
pub trait ReportSink: Send + Sync {
    fn flush(&self, lines: &[String]) -> io::Result<()>;
}

/// Writes one line per report entry, replacing any previous file.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    path: PathBuf,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for FileReportSink {
    fn flush(&self, lines: &[String]) -> io::Result<()> {
        let mut body = String::new();
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        fs::write(&self.path, body)
    }
}

/// Keeps flushed lines in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    lines: Mutex<Vec<String>>,
    flushes: Mutex<usize>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of the most recent flush.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.lock().map(|n| *n).unwrap_or(0)
    }
}

impl ReportSink for MemoryReportSink {
    fn flush(&self, lines: &[String]) -> io::Result<()> {
        let poisoned = || io::Error::other("report sink lock poisoned");
        *self.lines.lock().map_err(|_| poisoned())? = lines.to_vec();
        *self.flushes.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }
}
