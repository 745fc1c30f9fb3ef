//! batchcc core - header-driven batch compilation
//!
//! Compiles every C source in a directory independently:
//! - Scans `#include` directives for likely external libraries
//! - Resolves linker flags from a rule table and `pkg-config`
//! - Runs the compiler under a per-file time budget
//! - Moves artifacts / copies failed sources and writes a CSV report

pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod flags;
pub mod orchestrator;
pub mod provider;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod telemetry;

// Re-export key types
pub use classifier::{ArtifactClassifier, Disposition};
pub use config::{BatchConfig, DEFAULT_TIMEOUT_SECS};
pub use error::{ArtifactError, BatchError, BatchResult, ProviderError};
pub use executor::{artifact_path, CompileExecutor, CompileOutcome, CompileResult, TIMEOUT_MESSAGE};
pub use flags::{FlagResolver, FlagSet, Resolution, ToolResolutionFailure};
pub use orchestrator::{
    discover_sources, FilePipeline, FileReport, Orchestrator, RunOutcome, RunReport, SourceFile,
};
pub use provider::{FlagProvider, FlagQuery, PkgConfig};
pub use report::{
    read_report_csv, write_report_csv, CompileRecord, RecordStatus, ResultRecorder, RunSummary,
    REPORT_COLUMNS,
};
pub use rules::{FlagRule, RuleAction, RuleTable, TokenMatcher};
pub use scanner::{scan_headers, scan_headers_lossy};
pub use telemetry::init_tracing;

/// batchcc version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
