//! External flag-query tool.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{ProviderError, ProviderResult};

/// Which flag list to ask the tool for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagQuery {
    /// Include paths, defines (`--cflags`).
    Compile,
    /// Library paths and libraries (`--libs`).
    Link,
}

impl FlagQuery {
    pub fn as_arg(&self) -> &'static str {
        match self {
            FlagQuery::Compile => "--cflags",
            FlagQuery::Link => "--libs",
        }
    }
}

/// Source of compile/link flags for a named package.
#[async_trait]
pub trait FlagProvider: Send + Sync {
    /// Flags for `package`, in the order the tool reports them.
    async fn query(&self, package: &str, query: FlagQuery) -> ProviderResult<Vec<String>>;
}

/// `pkg-config` backed provider.
#[derive(Debug, Clone)]
pub struct PkgConfig {
    program: String,
}

impl PkgConfig {
    pub fn new() -> Self {
        Self::with_program("pkg-config")
    }

    /// Use a different executable with the same CLI (e.g. `pkgconf`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for PkgConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlagProvider for PkgConfig {
    async fn query(&self, package: &str, query: FlagQuery) -> ProviderResult<Vec<String>> {
        let output = Command::new(&self.program)
            .arg(query.as_arg())
            .arg(package)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ProviderError::ToolUnavailable {
                tool: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProviderError::PackageNotFound {
                tool: self.program.clone(),
                package: package.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }
}
