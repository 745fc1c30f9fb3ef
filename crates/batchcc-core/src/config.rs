//! Batch run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BatchError, BatchResult};

/// Default per-file compile budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Settings for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchConfig {
    /// Directory scanned (non-recursively) for sources.
    pub input_dir: PathBuf,

    /// Successful artifacts are moved here.
    pub success_dir: PathBuf,

    /// Sources that failed to compile are copied here.
    pub failed_dir: PathBuf,

    /// CSV report location.
    pub report_path: PathBuf,

    /// Optional JSON run summary location.
    #[serde(default)]
    pub summary_json: Option<PathBuf>,

    /// Compiler executable, resolved on `PATH`.
    pub compiler: String,

    /// Extension of files to compile, without the dot.
    pub source_extension: String,

    /// Extension of built artifacts, without the dot.
    pub output_extension: String,

    /// Wall-clock budget per compile.
    pub timeout_secs: u64,

    /// Maximum concurrent compiles.
    pub jobs: usize,
}

impl BatchConfig {
    /// Defaults for everything except the input directory.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            success_dir: PathBuf::from("./success"),
            failed_dir: PathBuf::from("./failed"),
            report_path: PathBuf::from("compile_results.csv"),
            summary_json: None,
            compiler: "gcc".to_string(),
            source_extension: "c".to_string(),
            output_extension: "out".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            jobs: default_jobs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> BatchResult<()> {
        if self.jobs == 0 {
            return Err(BatchError::InvalidConfig("jobs must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(BatchError::InvalidConfig(
                "timeout must be at least 1 second".into(),
            ));
        }
        if self.compiler.trim().is_empty() {
            return Err(BatchError::InvalidConfig("compiler must not be empty".into()));
        }
        if self.source_extension.is_empty() || self.output_extension.is_empty() {
            return Err(BatchError::InvalidConfig(
                "source and output extensions must not be empty".into(),
            ));
        }
        if self.source_extension == self.output_extension {
            return Err(BatchError::InvalidConfig(
                "output extension must differ from source extension".into(),
            ));
        }
        Ok(())
    }
}

/// Available parallelism, or 1 when it cannot be determined.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
