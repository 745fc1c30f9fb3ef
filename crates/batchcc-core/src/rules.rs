//! Header-to-flag rule table.
//!
//! Rules are plain data so the table can be replaced from a TOML file without
//! touching resolution logic:
//!
//! ```toml
//! [[rules]]
//! name = "math"
//! matcher = { kind = "exact", values = ["math.h"] }
//! action = { kind = "link", flags = ["-lm"] }
//!
//! [[rules]]
//! name = "libcurl"
//! matcher = { kind = "contains", fragment = "curl/" }
//! content_marker = "curl_easy_"
//! action = { kind = "package", package = "libcurl" }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BatchError, BatchResult};

/// How a rule tests a single dependency token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenMatcher {
    /// Token, trimmed, equals one of `values`.
    Exact { values: Vec<String> },

    /// Token contains `fragment` anywhere.
    Contains { fragment: String },
}

impl TokenMatcher {
    fn exact(values: &[&str]) -> Self {
        TokenMatcher::Exact {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn contains(fragment: &str) -> Self {
        TokenMatcher::Contains {
            fragment: fragment.to_string(),
        }
    }

    /// Whether `token` satisfies this matcher.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            TokenMatcher::Exact { values } => values.iter().any(|v| v == token.trim()),
            TokenMatcher::Contains { fragment } => token.contains(fragment.as_str()),
        }
    }
}

/// What a rule contributes when it fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAction {
    /// Append literal linker flags.
    Link { flags: Vec<String> },

    /// Ask the flag-query tool for this package's compile and link flags.
    Package { package: String },
}

/// One (predicate, effect) entry of the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagRule {
    pub name: String,
    pub matcher: TokenMatcher,

    /// Fragment searched for in the raw source text as an alternative trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_marker: Option<String>,

    pub action: RuleAction,
}

impl FlagRule {
    /// Link rule built from literals.
    pub fn link(name: &str, matcher: TokenMatcher, flags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            matcher,
            content_marker: None,
            action: RuleAction::Link {
                flags: flags.iter().map(|f| f.to_string()).collect(),
            },
        }
    }

    /// Package-query rule built from literals.
    pub fn package(name: &str, matcher: TokenMatcher, package: &str) -> Self {
        Self {
            name: name.to_string(),
            matcher,
            content_marker: None,
            action: RuleAction::Package {
                package: package.to_string(),
            },
        }
    }

    /// Also fire when `marker` appears in the file content.
    pub fn with_content_marker(mut self, marker: &str) -> Self {
        self.content_marker = Some(marker.to_string());
        self
    }

    /// Whether the rule fires for these tokens / this content.
    pub fn fires(&self, tokens: &[String], content: Option<&str>) -> bool {
        if tokens.iter().any(|t| self.matcher.matches(t)) {
            return true;
        }
        match (&self.content_marker, content) {
            (Some(marker), Some(text)) => text.contains(marker.as_str()),
            _ => false,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.action, RuleAction::Link { .. })
    }
}

/// Ordered rule set used by the flag resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleTable {
    #[serde(default)]
    pub rules: Vec<FlagRule>,
}

impl RuleTable {
    /// Table with no rules; every file compiles without extra flags.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The stock rules for common C libraries.
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                FlagRule::link("math", TokenMatcher::exact(&["math.h"]), &["-lm"]),
                FlagRule::link("jpeg", TokenMatcher::exact(&["jpeglib.h"]), &["-ljpeg"]),
                FlagRule::link(
                    "x11",
                    TokenMatcher::exact(&["X11/Xlib.h", "X11/Xutil.h"]),
                    &["-lX11"],
                ),
                FlagRule::link("xext", TokenMatcher::contains("X11/extensions/"), &["-lXext"]),
                FlagRule::package("opencv", TokenMatcher::contains("opencv2/"), "opencv4"),
                FlagRule::package("sdl2", TokenMatcher::contains("SDL2/"), "sdl2"),
                FlagRule::package("libxml", TokenMatcher::contains("libxml/"), "libxml-2.0"),
                FlagRule::package("json-c", TokenMatcher::contains("json-c"), "json-c"),
                FlagRule::package("libzip", TokenMatcher::contains("zip.h"), "libzip"),
                FlagRule::package("libcurl", TokenMatcher::contains("curl/"), "libcurl")
                    .with_content_marker("curl_easy_"),
            ],
        }
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: FlagRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parse a table from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a table from a TOML file.
    pub fn load(path: &Path) -> BatchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BatchError::RuleTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text).map_err(|e| BatchError::RuleTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Rules in evaluation order: every link rule, then every package rule,
    /// each group keeping table order.
    pub fn in_priority_order(&self) -> impl Iterator<Item = &FlagRule> {
        let links = self.rules.iter().filter(|r| r.is_link());
        let packages = self.rules.iter().filter(|r| !r.is_link());
        links.chain(packages)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}
