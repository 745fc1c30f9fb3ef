//! Error types for batch compilation.
//!
//! Only [`BatchError`] aborts a run. Provider and artifact errors are caught at
//! the file boundary and end up in that file's report row.

use std::path::PathBuf;

/// Run-level errors. Any of these stops the run before or after the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("input directory '{}' does not exist", path.display())]
    InputDirMissing { path: PathBuf },

    #[error("input directory '{}' could not be listed: {source}", path.display())]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("rule table '{}' could not be loaded: {reason}", path.display())]
    RuleTable { path: PathBuf, reason: String },

    #[error("report '{}' could not be written: {reason}", path.display())]
    Report { path: PathBuf, reason: String },

    #[error("compile worker failed: {0}")]
    Worker(String),
}

/// Result type for run-level operations.
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Failures of the external flag-query tool. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("flag-query tool '{tool}' could not be started: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("{tool} couldn't find {package}: {stderr}")]
    PackageNotFound {
        tool: String,
        package: String,
        stderr: String,
    },
}

/// Result type for flag-query operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// The harness could not file a compile result. Distinct from any compiler outcome.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot create directory '{}': {source}", dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot move '{}' to '{}': {source}", from.display(), to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot copy '{}' to '{}': {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for artifact filing.
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;
