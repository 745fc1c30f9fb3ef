//! Integration tests for batch runs with a scripted fake compiler.
#![cfg(unix)]

use batchcc_core::fakes::StaticFlagProvider;
use batchcc_core::{
    read_report_csv, BatchConfig, BatchError, Orchestrator, RecordStatus, RuleTable, RunOutcome,
    RunReport, TIMEOUT_MESSAGE,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Behaves like `cc <src> -o <out> [flags...]`, keyed on the source name:
/// - `*fail*`        prints a diagnostic to stderr and exits 1
/// - `*slow*`        sleeps past any test budget in a forked child
/// - `*noartifact*`  exits 0 without writing the output
/// - otherwise       writes its argv into the output and exits 0
const FAKE_COMPILER: &str = r#"#!/bin/sh
src="$1"
out="$3"
case "$src" in
  *fail*) echo "$src:1:1: error: expected ';' before '}' token" >&2; exit 1 ;;
  *slow*) sleep 30; exit 0 ;;
  *noartifact*) exit 0 ;;
esac
echo "$@" > "$out"
echo "compiled $src"
"#;

struct Workspace {
    tmp: TempDir,
    compiler: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        std::fs::create_dir(tmp.path().join("input")).expect("input dir");
        let compiler = tmp.path().join("fakecc");
        std::fs::write(&compiler, FAKE_COMPILER).expect("write fake compiler");
        std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake compiler");
        Self { tmp, compiler }
    }

    fn input(&self) -> PathBuf {
        self.tmp.path().join("input")
    }

    fn success(&self) -> PathBuf {
        self.tmp.path().join("success")
    }

    fn failed(&self) -> PathBuf {
        self.tmp.path().join("failed")
    }

    fn report(&self) -> PathBuf {
        self.tmp.path().join("out").join("compile_results.csv")
    }

    fn source(&self, name: &str, body: &str) -> PathBuf {
        let path = self.input().join(name);
        std::fs::write(&path, body).expect("write source");
        path
    }

    fn config(&self) -> BatchConfig {
        BatchConfig {
            success_dir: self.success(),
            failed_dir: self.failed(),
            report_path: self.report(),
            compiler: self.compiler.to_string_lossy().into_owned(),
            jobs: 2,
            ..BatchConfig::new(self.input())
        }
    }

    async fn run_with(&self, config: BatchConfig, provider: StaticFlagProvider) -> RunOutcome {
        Orchestrator::new(config, RuleTable::builtin(), Arc::new(provider))
            .expect("valid config")
            .run()
            .await
            .expect("run succeeds")
    }

    async fn run(&self) -> RunReport {
        match self.run_with(self.config(), StaticFlagProvider::new()).await {
            RunOutcome::Completed(report) => report,
            RunOutcome::NoSources => panic!("expected sources"),
        }
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read file")
}

/// Test: report has one row per source, in discovery order, with the right statuses
#[tokio::test]
async fn test_mixed_batch_report_and_dispositions() {
    let ws = Workspace::new();
    ws.source("good.c", "#include <stdio.h>\n#include <math.h>\nint main(void){return 0;}\n");
    ws.source("bad_fail.c", "#include <stdio.h>\nint main(void){ return }\n");
    ws.source("README.txt", "not a source");

    let report = ws.run().await;
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.failed, 1);

    let rows = read_report_csv(&ws.report()).expect("read report");
    assert_eq!(rows.len(), 2, "one row per matched source");
    assert_eq!(rows[0].file, "bad_fail.c");
    assert_eq!(rows[0].status, RecordStatus::Fail);
    assert!(rows[0].message.contains("expected ';'"));
    assert_eq!(rows[0].flags, "");
    assert_eq!(rows[1].file, "good.c");
    assert_eq!(rows[1].status, RecordStatus::Success);
    assert_eq!(rows[1].headers, "stdio.h;math.h");
    assert_eq!(rows[1].flags, "-lm");
    assert_eq!(rows[1].message, format!("compiled {}", ws.input().join("good.c").display()));

    let header = read(&ws.report());
    assert!(header.starts_with("file,status,headers,flags,message,timestamp"));

    // Success: artifact moved, not copied; source untouched.
    assert!(ws.success().join("good.out").exists());
    assert!(!ws.input().join("good.out").exists());
    assert!(ws.input().join("good.c").exists());
    assert!(!ws.failed().join("good.c").exists());

    // Failure: source copied, not moved; nothing in success.
    assert!(ws.failed().join("bad_fail.c").exists());
    assert!(ws.input().join("bad_fail.c").exists());
    assert!(!ws.success().join("bad_fail.out").exists());
}

/// Test: flags reach the compiler after the mandatory args, in resolved order
#[tokio::test]
async fn test_flags_passed_in_resolved_order() {
    let ws = Workspace::new();
    let src = ws.source(
        "window.c",
        "#include <SDL2/SDL.h>\n#include <math.h>\n#include <X11/extensions/Xrandr.h>\nint main(void){return 0;}\n",
    );
    let provider =
        StaticFlagProvider::new().with_package("sdl2", &["-I/usr/include/SDL2", "-D_REENTRANT"], &["-lSDL2"]);

    let outcome = ws.run_with(ws.config(), provider).await;
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.files[0].record.flags, "-lm -lXext -I/usr/include/SDL2 -D_REENTRANT -lSDL2");

    let argv = read(&ws.success().join("window.out"));
    let out = ws.input().join("window.out");
    assert_eq!(
        argv.trim(),
        format!(
            "{} -o {} -lm -lXext -I/usr/include/SDL2 -D_REENTRANT -lSDL2",
            src.display(),
            out.display()
        )
    );
}

/// Test: a file with no matching rules compiles with no extra flags
#[tokio::test]
async fn test_no_rules_means_no_extra_flags() {
    let ws = Workspace::new();
    let src = ws.source("plain.c", "#include <stdio.h>\nint main(void){return 0;}\n");

    let report = ws.run().await;
    assert_eq!(report.files[0].record.flags, "");

    let argv = read(&ws.success().join("plain.out"));
    let out = ws.input().join("plain.out");
    assert_eq!(argv.trim(), format!("{} -o {}", src.display(), out.display()));
}

/// Test: an unresolvable package is recorded but does not stop the file
#[tokio::test]
async fn test_missing_package_is_non_fatal() {
    let ws = Workspace::new();
    ws.source("vision.c", "#include <opencv2/core.hpp>\n#include <math.h>\nint main(void){return 0;}\n");

    let report = ws.run().await;
    let file = &report.files[0];
    assert_eq!(file.record.status, RecordStatus::Success);
    assert_eq!(file.record.flags, "-lm");
    assert_eq!(file.resolution_failures.len(), 1);
    assert_eq!(file.resolution_failures[0].package, "opencv4");
}

/// Test: timeout is its own status, source copied, no artifact filed
#[tokio::test]
async fn test_timeout_kills_compiler_and_copies_source() {
    let ws = Workspace::new();
    ws.source("slow.c", "int main(void){return 0;}\n");
    ws.source("quick.c", "int main(void){return 0;}\n");
    let config = BatchConfig {
        timeout_secs: 1,
        ..ws.config()
    };

    let started = std::time::Instant::now();
    let RunOutcome::Completed(report) = ws.run_with(config, StaticFlagProvider::new()).await else {
        panic!("expected a completed run");
    };
    assert!(started.elapsed() < std::time::Duration::from_secs(20));

    let rows = read_report_csv(&ws.report()).expect("read report");
    assert_eq!(rows.len(), 2);
    let slow = rows.iter().find(|r| r.file == "slow.c").expect("slow row");
    assert_eq!(slow.status, RecordStatus::Timeout);
    assert_eq!(slow.message, TIMEOUT_MESSAGE);
    assert_eq!(report.summary.timed_out, 1);

    assert!(ws.failed().join("slow.c").exists());
    assert!(ws.input().join("slow.c").exists());
    assert!(!ws.success().join("slow.out").exists());
    assert!(ws.success().join("quick.out").exists());
}

/// Test: a missing artifact after a successful compile is an artifact error, not a Fail
#[tokio::test]
async fn test_unfiled_artifact_is_distinct_status() {
    let ws = Workspace::new();
    ws.source("noartifact.c", "int main(void){return 0;}\n");

    let report = ws.run().await;
    let file = &report.files[0];
    assert_eq!(file.record.status, RecordStatus::ArtifactError);
    assert!(file.record.message.contains("cannot move"));
    assert!(file.disposition.is_none());
    assert_eq!(report.summary.artifact_errors, 1);
    assert!(!ws.failed().join("noartifact.c").exists());
}

/// Test: a failed compile that cannot be filed keeps the compiler's diagnostic
#[tokio::test]
async fn test_unfiled_failure_keeps_compiler_diagnostic() {
    let ws = Workspace::new();
    ws.source("broken_fail.c", "int main(void){ return }\n");
    // A plain file where the failed directory should go.
    std::fs::write(ws.failed(), "in the way").expect("block failed dir");

    let report = ws.run().await;
    let file = &report.files[0];
    assert_eq!(file.record.status, RecordStatus::ArtifactError);
    assert!(file.record.message.contains("expected ';'"));
    assert!(file.disposition.is_none());
}

/// Test: empty input writes nothing at all
#[tokio::test]
async fn test_empty_input_writes_nothing() {
    let ws = Workspace::new();
    ws.source("notes.md", "# nothing to build");

    let outcome = ws.run_with(ws.config(), StaticFlagProvider::new()).await;
    assert!(matches!(outcome, RunOutcome::NoSources));
    assert!(!ws.report().exists());
    assert!(!ws.success().exists());
    assert!(!ws.failed().exists());
}

/// Test: missing input directory aborts with no report
#[tokio::test]
async fn test_missing_input_dir_is_configuration_error() {
    let ws = Workspace::new();
    let config = BatchConfig {
        input_dir: ws.tmp.path().join("does-not-exist"),
        ..ws.config()
    };

    let err = Orchestrator::new(config, RuleTable::builtin(), Arc::new(StaticFlagProvider::new()))
        .expect("valid config")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::InputDirMissing { .. }));
    assert!(!ws.report().exists());
}

/// Test: report order follows discovery order under parallel workers
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_run_keeps_discovery_order() {
    let ws = Workspace::new();
    let names: Vec<String> = (0..12).map(|i| format!("prog_{i:02}.c")).collect();
    for (i, name) in names.iter().enumerate() {
        let body = if i % 3 == 0 {
            "#include <math.h>\nint main(void){return 0;}\n"
        } else {
            "int main(void){return 0;}\n"
        };
        ws.source(name, body);
    }
    ws.source("prog_fail.c", "int main(void){ return }\n");

    let config = BatchConfig {
        jobs: 4,
        ..ws.config()
    };
    let RunOutcome::Completed(_) = ws.run_with(config, StaticFlagProvider::new()).await else {
        panic!("expected a completed run");
    };

    let rows = read_report_csv(&ws.report()).expect("read report");
    let files: Vec<&str> = rows.iter().map(|r| r.file.as_str()).collect();
    let mut expected: Vec<&str> = names.iter().map(String::as_str).collect();
    expected.push("prog_fail.c");
    assert_eq!(files, expected);
    assert_eq!(rows.iter().filter(|r| r.status == RecordStatus::Success).count(), 12);
}

/// Test: re-running on unchanged input reproduces row count and statuses
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let ws = Workspace::new();
    ws.source("a.c", "#include <math.h>\nint main(void){return 0;}\n");
    ws.source("b_fail.c", "int main(void){ return }\n");
    ws.source("c.c", "int main(void){return 0;}\n");

    ws.run().await;
    let first = read_report_csv(&ws.report()).expect("first report");
    ws.run().await;
    let second = read_report_csv(&ws.report()).expect("second report");

    let shape = |rows: &[batchcc_core::CompileRecord]| {
        rows.iter()
            .map(|r| (r.file.clone(), r.status, r.headers.clone(), r.flags.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(first.len(), second.len());
    assert_eq!(shape(&first), shape(&second));
}

/// Test: optional JSON summary mirrors the counts
#[tokio::test]
async fn test_summary_json_written() {
    let ws = Workspace::new();
    ws.source("a.c", "int main(void){return 0;}\n");
    ws.source("z_fail.c", "int main(void){ return }\n");
    let summary_path = ws.tmp.path().join("out").join("summary.json");
    let config = BatchConfig {
        summary_json: Some(summary_path.clone()),
        ..ws.config()
    };

    ws.run_with(config, StaticFlagProvider::new()).await;

    let raw: serde_json::Value = serde_json::from_str(&read(&summary_path)).expect("parse summary");
    assert_eq!(raw["total"], 2);
    assert_eq!(raw["succeeded"], 1);
    assert_eq!(raw["failed"], 1);
    assert_eq!(raw["skipped"], 0);
}
