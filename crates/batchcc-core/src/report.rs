//! Per-file compile records and the run report.
//!
//! Two artifacts:
//! - the CSV report (`file,status,headers,flags,message,timestamp`), one row per
//!   attempted source file, written once at the end of a run
//! - an optional JSON run summary with aggregate counts

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{BatchError, BatchResult};

/// Column order of the CSV report.
pub const REPORT_COLUMNS: [&str; 6] = ["file", "status", "headers", "flags", "message", "timestamp"];

/// Report status of one file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Success,
    /// Compiler rejected the source.
    Fail,
    Timeout,
    /// Compile result could not be filed (move/copy failed).
    ArtifactError,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "Success",
            RecordStatus::Fail => "Fail",
            RecordStatus::Timeout => "Timeout",
            RecordStatus::ArtifactError => "ArtifactError",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecordStatus::Success)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report row. Field order is the CSV column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileRecord {
    pub file: String,
    pub status: RecordStatus,
    /// Dependency tokens joined with `;`.
    pub headers: String,
    /// Flags joined with a single space.
    pub flags: String,
    pub message: String,
    pub timestamp: String,
}

impl CompileRecord {
    /// Build a record stamped with the current local time.
    pub fn new(
        file: impl Into<String>,
        status: RecordStatus,
        tokens: &[String],
        flags: &[String],
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            status,
            headers: tokens.join(";"),
            flags: flags.join(" "),
            message: message.into(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

/// Aggregate counts for a run. Derived from the records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub artifact_errors: usize,
    /// Files never attempted because the run was cancelled.
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_records(records: &[CompileRecord], skipped: usize) -> Self {
        let count = |status| records.iter().filter(|r| r.status == status).count();
        let succeeded = count(RecordStatus::Success);
        Self {
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
            timed_out: count(RecordStatus::Timeout),
            artifact_errors: count(RecordStatus::ArtifactError),
            skipped,
        }
    }
}

/// JSON summary artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummaryArtifact {
    pub generated_at: DateTime<Utc>,
    pub input_dir: PathBuf,
    #[serde(flatten)]
    pub summary: RunSummary,
}

/// Collects records and persists them.
#[derive(Debug, Default)]
pub struct ResultRecorder {
    records: Vec<CompileRecord>,
}

impl ResultRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CompileRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CompileRecord] {
        &self.records
    }

    pub fn write_csv(&self, path: &Path) -> BatchResult<()> {
        write_report_csv(path, &self.records)
    }
}

impl From<Vec<CompileRecord>> for ResultRecorder {
    fn from(records: Vec<CompileRecord>) -> Self {
        Self { records }
    }
}

fn report_error(path: &Path, reason: impl fmt::Display) -> BatchError {
    BatchError::Report {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn ensure_parent(path: &Path) -> BatchResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| report_error(path, e))
        }
        _ => Ok(()),
    }
}

/// Write the CSV report. The header row is written even for zero records.
pub fn write_report_csv(path: &Path, records: &[CompileRecord]) -> BatchResult<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| report_error(path, e))?;
    writer
        .write_record(REPORT_COLUMNS)
        .map_err(|e| report_error(path, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| report_error(path, e))?;
    }
    writer.flush().map_err(|e| report_error(path, e))
}

/// Read a CSV report back.
pub fn read_report_csv(path: &Path) -> BatchResult<Vec<CompileRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| report_error(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<CompileRecord>, _>>()
        .map_err(|e| report_error(path, e))
}

/// Write the JSON summary in pretty format.
pub fn write_summary_json(path: &Path, artifact: &RunSummaryArtifact) -> BatchResult<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(artifact).map_err(|e| report_error(path, e))?;
    std::fs::write(path, content).map_err(|e| report_error(path, e))
}
