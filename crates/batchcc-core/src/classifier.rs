//! Files compile results into the success or failed directory.
//!
//! Success moves the built artifact; any other outcome copies the source.
//! Exactly one of the two happens per attempted file.

use std::path::{Path, PathBuf};

use crate::error::{ArtifactError, ArtifactResult};
use crate::executor::CompileOutcome;

/// Where a file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Artifact now lives at this path under the success directory.
    ArtifactMoved(PathBuf),
    /// Source was copied to this path under the failed directory.
    SourceCopied(PathBuf),
}

/// Destination directories for classified results.
#[derive(Debug, Clone)]
pub struct ArtifactClassifier {
    success_dir: PathBuf,
    failed_dir: PathBuf,
}

impl ArtifactClassifier {
    pub fn new(success_dir: impl Into<PathBuf>, failed_dir: impl Into<PathBuf>) -> Self {
        Self {
            success_dir: success_dir.into(),
            failed_dir: failed_dir.into(),
        }
    }

    pub fn success_dir(&self) -> &Path {
        &self.success_dir
    }

    pub fn failed_dir(&self) -> &Path {
        &self.failed_dir
    }

    /// Route by outcome. Directories are created on demand; concurrent creation
    /// by sibling workers is fine.
    pub async fn classify(
        &self,
        outcome: CompileOutcome,
        source: &Path,
        artifact: &Path,
    ) -> ArtifactResult<Disposition> {
        if outcome.is_success() {
            let dest = destination(&self.success_dir, artifact);
            ensure_dir(&self.success_dir).await?;
            relocate(artifact, &dest).await?;
            Ok(Disposition::ArtifactMoved(dest))
        } else {
            let dest = destination(&self.failed_dir, source);
            ensure_dir(&self.failed_dir).await?;
            tokio::fs::copy(source, &dest)
                .await
                .map_err(|source_err| ArtifactError::Copy {
                    from: source.to_path_buf(),
                    to: dest.clone(),
                    source: source_err,
                })?;
            Ok(Disposition::SourceCopied(dest))
        }
    }
}

fn destination(dir: &Path, file: &Path) -> PathBuf {
    match file.file_name() {
        Some(name) => dir.join(name),
        None => dir.join(file),
    }
}

async fn ensure_dir(dir: &Path) -> ArtifactResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ArtifactError::CreateDir {
            dir: dir.to_path_buf(),
            source,
        })
}

/// Rename, falling back to copy + remove when the rename crosses filesystems.
async fn relocate(from: &Path, to: &Path) -> ArtifactResult<()> {
    let err = |source| ArtifactError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await.map_err(err)?;
    tokio::fs::remove_file(from).await.map_err(err)
}
