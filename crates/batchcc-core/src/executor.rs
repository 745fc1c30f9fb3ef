//! Single-file compiler invocation under a wall-clock budget.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::flags::FlagSet;

/// Diagnostic recorded for every timed-out compile.
pub const TIMEOUT_MESSAGE: &str = "Compilation timed out.";

/// How a compile attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileOutcome {
    Success,
    CompileFailure,
    Timeout,
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileOutcome::Success)
    }
}

/// Result of one compiler invocation.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub outcome: CompileOutcome,

    /// Stdout on success, stderr on failure, [`TIMEOUT_MESSAGE`] on timeout.
    pub diagnostic: String,

    /// `None` on timeout or spawn failure.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,
}

/// Output artifact path: `source` with its extension replaced.
pub fn artifact_path(source: &Path, output_extension: &str) -> PathBuf {
    source.with_extension(output_extension)
}

/// Runs `<compiler> <source> -o <output> [flags...]`.
#[derive(Debug, Clone)]
pub struct CompileExecutor {
    compiler: String,
    timeout: Duration,
}

impl CompileExecutor {
    pub fn new(compiler: impl Into<String>, timeout: Duration) -> Self {
        Self {
            compiler: compiler.into(),
            timeout,
        }
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Argument vector after the program name. Paths are passed through
    /// as-is, so non-UTF-8 file names reach the compiler intact. Flags keep
    /// their resolved order.
    pub fn command_args(source: &Path, output: &Path, flags: &FlagSet) -> Vec<OsString> {
        let mut args = vec![
            source.as_os_str().to_os_string(),
            OsString::from("-o"),
            output.as_os_str().to_os_string(),
        ];
        args.extend(flags.as_slice().iter().map(OsString::from));
        args
    }

    /// Compile `source` into `output`. Exactly one attempt; a compiler that
    /// overruns the budget is killed together with every process it forked,
    /// and reaped before returning.
    pub async fn compile(&self, source: &Path, output: &Path, flags: &FlagSet) -> CompileResult {
        let start = Instant::now();
        let args = Self::command_args(source, output, flags);
        debug!(compiler = %self.compiler, ?args, "invoking compiler");

        let mut command = Command::new(&self.compiler);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down cc1/as/ld too.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(compiler = %self.compiler, error = %e, "compiler could not be started");
                return CompileResult {
                    outcome: CompileOutcome::CompileFailure,
                    diagnostic: format!("failed to start {}: {}", self.compiler, e),
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        // Drain both pipes concurrently so a chatty compiler cannot block on a full pipe.
        let stdout_task = child.stdout.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return CompileResult {
                    outcome: CompileOutcome::CompileFailure,
                    diagnostic: format!("failed to wait for {}: {}", self.compiler, e),
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(_) => {
                kill_process_group(&child);
                if let Err(e) = child.kill().await {
                    warn!(compiler = %self.compiler, error = %e, "failed to kill timed-out compiler");
                }
                abort_reader(stdout_task);
                abort_reader(stderr_task);
                return CompileResult {
                    outcome: CompileOutcome::Timeout,
                    diagnostic: TIMEOUT_MESSAGE.to_string(),
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        let stdout = collect_reader(stdout_task).await;
        let stderr = collect_reader(stderr_task).await;
        let success = status.success();

        CompileResult {
            outcome: if success {
                CompileOutcome::Success
            } else {
                CompileOutcome::CompileFailure
            },
            diagnostic: if success { stdout } else { stderr },
            exit_code: status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

type Reader = Option<tokio::task::JoinHandle<Vec<u8>>>;

async fn collect_reader(task: Reader) -> String {
    match task {
        Some(handle) => {
            let bytes = handle.await.unwrap_or_default();
            String::from_utf8_lossy(&bytes).trim().to_string()
        }
        None => String::new(),
    }
}

/// SIGKILL the whole group led by `child`. The driver itself is reaped
/// afterwards by `Child::kill`.
#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: killpg only sends a signal; pid is the group id set at spawn.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid, error = %err, "failed to kill compiler process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child) {}

// A worker that escaped the group may still hold a pipe open.
fn abort_reader(task: Reader) {
    if let Some(handle) = task {
        handle.abort();
    }
}
