//! Batch orchestration: discover sources, run each through
//! scan → resolve → compile → classify on a bounded worker pool, then persist
//! the report in discovery order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::{ArtifactClassifier, Disposition};
use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult};
use crate::executor::{artifact_path, CompileExecutor, CompileOutcome};
use crate::flags::{FlagResolver, ToolResolutionFailure};
use crate::provider::FlagProvider;
use crate::report::{
    write_summary_json, CompileRecord, RecordStatus, ResultRecorder, RunSummary,
    RunSummaryArtifact,
};
use crate::rules::RuleTable;
use crate::scanner::scan_headers;

/// A source file found in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Position in discovery order.
    pub index: usize,
    pub path: PathBuf,
    pub name: String,
}

/// List files directly inside `dir` whose name ends in `.{extension}`, sorted
/// by name.
pub fn discover_sources(dir: &Path, extension: &str) -> BatchResult<Vec<SourceFile>> {
    if !dir.is_dir() {
        return Err(BatchError::InputDirMissing {
            path: dir.to_path_buf(),
        });
    }
    let unreadable = |source| BatchError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let suffix = format!(".{extension}");
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(&suffix) {
            continue;
        }
        if !entry.path().is_file() {
            continue;
        }
        found.push((name, entry.path()));
    }
    found.sort();

    Ok(found
        .into_iter()
        .enumerate()
        .map(|(index, (name, path))| SourceFile { index, path, name })
        .collect())
}

/// Everything produced for one attempted file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub record: CompileRecord,
    /// `None` only when filing the result failed.
    pub disposition: Option<Disposition>,
    pub resolution_failures: Vec<ToolResolutionFailure>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// In discovery order.
    pub files: Vec<FileReport>,
    pub summary: RunSummary,
    pub report_path: PathBuf,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn records(&self) -> impl Iterator<Item = &CompileRecord> {
        self.files.iter().map(|f| &f.record)
    }
}

/// How a run ended without error.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Input directory held no matching files; nothing was written.
    NoSources,
    Completed(RunReport),
}

/// The per-file pipeline. Shared read-only by every worker.
#[derive(Clone)]
pub struct FilePipeline {
    resolver: FlagResolver,
    executor: CompileExecutor,
    classifier: ArtifactClassifier,
    output_extension: String,
}

impl FilePipeline {
    pub fn new(
        resolver: FlagResolver,
        executor: CompileExecutor,
        classifier: ArtifactClassifier,
        output_extension: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            executor,
            classifier,
            output_extension: output_extension.into(),
        }
    }

    /// Run one file to a terminal disposition. Never fails: every problem
    /// becomes part of the returned record.
    #[instrument(skip(self, source), fields(file = %source.name))]
    pub async fn process(&self, source: &SourceFile) -> FileReport {
        debug!("processing source");

        let content = match tokio::fs::read(&source.path).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!(error = %e, "source unreadable; scanning skipped");
                None
            }
        };
        let tokens = content.as_deref().map(scan_headers).unwrap_or_default();

        let resolution = self.resolver.resolve(&tokens, content.as_deref()).await;
        debug!(tokens = ?tokens, flags = %resolution.flags.joined(), "flags resolved");

        let artifact = artifact_path(&source.path, &self.output_extension);
        let compiled = self
            .executor
            .compile(&source.path, &artifact, &resolution.flags)
            .await;

        let (status, message, disposition) = match self
            .classifier
            .classify(compiled.outcome, &source.path, &artifact)
            .await
        {
            Ok(disposition) => (
                status_for(compiled.outcome),
                compiled.diagnostic,
                Some(disposition),
            ),
            Err(e) => {
                error!(error = %e, "could not file compile result");
                let message = if compiled.outcome.is_success() || compiled.diagnostic.is_empty() {
                    e.to_string()
                } else {
                    // Keep the compiler's reason alongside the filing error.
                    format!("{e}\n{}", compiled.diagnostic)
                };
                (RecordStatus::ArtifactError, message, None)
            }
        };

        info!(
            status = %status,
            duration_ms = compiled.duration_ms,
            exit_code = ?compiled.exit_code,
            "file processed"
        );

        FileReport {
            record: CompileRecord::new(
                source.name.clone(),
                status,
                &tokens,
                resolution.flags.as_slice(),
                message,
            ),
            disposition,
            resolution_failures: resolution.failures,
        }
    }
}

fn status_for(outcome: CompileOutcome) -> RecordStatus {
    match outcome {
        CompileOutcome::Success => RecordStatus::Success,
        CompileOutcome::CompileFailure => RecordStatus::Fail,
        CompileOutcome::Timeout => RecordStatus::Timeout,
    }
}

/// Drives a whole batch run.
pub struct Orchestrator {
    config: BatchConfig,
    pipeline: Arc<FilePipeline>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    /// Build from configuration. Fails on invalid configuration only.
    pub fn new(
        config: BatchConfig,
        rules: RuleTable,
        provider: Arc<dyn FlagProvider>,
    ) -> BatchResult<Self> {
        config.validate()?;
        let pipeline = FilePipeline::new(
            FlagResolver::new(rules, provider),
            CompileExecutor::new(config.compiler.clone(), config.timeout()),
            ArtifactClassifier::new(config.success_dir.clone(), config.failed_dir.clone()),
            config.output_extension.clone(),
        );
        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            cancel: None,
        })
    }

    /// Stop starting new files once `cancel` turns `true`. Files already being
    /// processed finish normally.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Discover, process and report. One file's failure never aborts the run.
    #[instrument(skip(self), fields(input_dir = %self.config.input_dir.display()))]
    pub async fn run(&self) -> BatchResult<RunOutcome> {
        let start = Instant::now();
        let sources = discover_sources(&self.config.input_dir, &self.config.source_extension)?;
        if sources.is_empty() {
            info!("no .{} files found", self.config.source_extension);
            return Ok(RunOutcome::NoSources);
        }

        info!(files = sources.len(), jobs = self.config.jobs, "starting batch compile");
        let discovered = sources.len();
        let files = self.process_all(sources).await?;
        let skipped = discovered - files.len();
        if skipped > 0 {
            warn!(skipped, "run cancelled before all files were attempted");
        }

        let recorder = ResultRecorder::from(
            files.iter().map(|f| f.record.clone()).collect::<Vec<_>>(),
        );
        recorder.write_csv(&self.config.report_path)?;
        info!(path = %self.config.report_path.display(), rows = recorder.records().len(), "report written");

        let summary = RunSummary::from_records(recorder.records(), skipped);
        if let Some(path) = &self.config.summary_json {
            let artifact = RunSummaryArtifact {
                generated_at: Utc::now(),
                input_dir: self.config.input_dir.clone(),
                summary: summary.clone(),
            };
            write_summary_json(path, &artifact)?;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms,
            "batch compile finished"
        );

        Ok(RunOutcome::Completed(RunReport {
            files,
            summary,
            report_path: self.config.report_path.clone(),
            duration_ms,
        }))
    }

    /// Fan out over at most `jobs` workers; results come back in discovery order.
    async fn process_all(&self, sources: Vec<SourceFile>) -> BatchResult<Vec<FileReport>> {
        let permits = Arc::new(Semaphore::new(self.config.jobs));
        let mut join_set = JoinSet::new();

        for source in sources {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&permits);
            let cancel = self.cancel.clone();

            join_set.spawn(async move {
                if is_cancelled(&cancel) {
                    return (source.index, None);
                }
                let _permit = permits.acquire_owned().await.ok();
                if is_cancelled(&cancel) {
                    return (source.index, None);
                }
                let report = pipeline.process(&source).await;
                (source.index, Some(report))
            });
        }

        let mut indexed = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, report) =
                joined.map_err(|e| BatchError::Worker(format!("compile task join error: {e}")))?;
            if let Some(report) = report {
                indexed.push((index, report));
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, report)| report).collect())
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}
