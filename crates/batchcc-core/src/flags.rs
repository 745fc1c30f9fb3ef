//! Dependency-token to compiler flag resolution.
//!
//! Two rule kinds contribute additively: link rules append literal flags,
//! package rules ask a [`FlagProvider`] for compile then link flags. A provider
//! failure drops that rule's flags and is reported back as a diagnostic; it never
//! stops the remaining rules from being evaluated.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{FlagProvider, FlagQuery};
use crate::rules::{FlagRule, RuleAction, RuleTable};

/// Ordered flags passed to the compiler after the mandatory arguments.
/// Never de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(Vec<String>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, flags: I) {
        self.0.extend(flags);
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Space-joined form used in the report.
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

impl From<Vec<String>> for FlagSet {
    fn from(flags: Vec<String>) -> Self {
        Self(flags)
    }
}

/// A package rule whose flags could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResolutionFailure {
    pub rule: String,
    pub package: String,
    pub error: ProviderError,
}

/// Outcome of resolving one file's tokens.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub flags: FlagSet,
    /// Names of the rules that fired, in evaluation order.
    pub fired: Vec<String>,
    pub failures: Vec<ToolResolutionFailure>,
}

/// Maps dependency tokens to a [`FlagSet`] using a [`RuleTable`].
#[derive(Clone)]
pub struct FlagResolver {
    table: RuleTable,
    provider: Arc<dyn FlagProvider>,
}

impl FlagResolver {
    pub fn new(table: RuleTable, provider: Arc<dyn FlagProvider>) -> Self {
        Self { table, provider }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Resolve flags for `tokens`. `content` enables content-marker rules; pass
    /// `None` when the source text could not be read.
    pub async fn resolve(&self, tokens: &[String], content: Option<&str>) -> Resolution {
        let mut resolution = Resolution::default();

        for rule in self.table.in_priority_order() {
            if !rule.fires(tokens, content) {
                continue;
            }
            resolution.fired.push(rule.name.clone());

            match &rule.action {
                RuleAction::Link { flags } => {
                    resolution.flags.extend(flags.iter().cloned());
                }
                RuleAction::Package { package } => match self.query_package(package).await {
                    Ok(flags) => {
                        debug!(rule = %rule.name, package = %package, ?flags, "package flags resolved");
                        resolution.flags.extend(flags);
                    }
                    Err(error) => {
                        warn!(rule = %rule.name, package = %package, error = %error, "package flags unavailable");
                        resolution.failures.push(failure(rule, package, error));
                    }
                },
            }
        }

        resolution
    }

    /// Compile flags followed by link flags; all or nothing.
    async fn query_package(&self, package: &str) -> ProviderResult<Vec<String>> {
        let mut flags = self.provider.query(package, FlagQuery::Compile).await?;
        flags.extend(self.provider.query(package, FlagQuery::Link).await?);
        Ok(flags)
    }
}

fn failure(rule: &FlagRule, package: &str, error: ProviderError) -> ToolResolutionFailure {
    ToolResolutionFailure {
        rule: rule.name.clone(),
        package: package.to_string(),
        error,
    }
}
