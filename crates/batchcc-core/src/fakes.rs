//! In-memory fakes (testing only)
//!
//! `StaticFlagProvider` answers flag queries from a fixed table and records
//! every query it receives, so tests do not depend on installed packages.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{FlagProvider, FlagQuery};

/// Flag provider backed by a `HashMap<package, (cflags, libs)>`.
#[derive(Debug, Default)]
pub struct StaticFlagProvider {
    packages: HashMap<String, (Vec<String>, Vec<String>)>,
    calls: Mutex<Vec<(String, FlagQuery)>>,
}

impl StaticFlagProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package with its compile and link flags.
    pub fn with_package(mut self, package: &str, cflags: &[&str], libs: &[&str]) -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        self.packages
            .insert(package.to_string(), (owned(cflags), owned(libs)));
        self
    }

    /// Every `(package, query)` seen so far, in call order.
    pub fn calls(&self) -> Vec<(String, FlagQuery)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlagProvider for StaticFlagProvider {
    async fn query(&self, package: &str, query: FlagQuery) -> ProviderResult<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((package.to_string(), query));

        let (cflags, libs) =
            self.packages
                .get(package)
                .ok_or_else(|| ProviderError::PackageNotFound {
                    tool: "static".to_string(),
                    package: package.to_string(),
                    stderr: format!("Package {package} was not found"),
                })?;

        Ok(match query {
            FlagQuery::Compile => cflags.clone(),
            FlagQuery::Link => libs.clone(),
        })
    }
}
