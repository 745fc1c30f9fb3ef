//! Include directive scanning.
//!
//! Line oriented: a directive split across lines, macro-expanded includes and
//! conditional compilation are not understood. Anything the scanner misses is
//! simply not resolved to flags and shows up later as a compile failure.

use regex::Regex;
use std::sync::OnceLock;

fn include_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*#include\s*[<"](\S+)[>"]"#).expect("include pattern is valid")
    })
}

/// Extract the header names from every `#include <...>` / `#include "..."` line,
/// in the order they appear. Duplicates are kept.
pub fn scan_headers(content: &str) -> Vec<String> {
    let pattern = include_pattern();
    content
        .lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Same as [`scan_headers`] for raw bytes; invalid UTF-8 is replaced, not rejected.
pub fn scan_headers_lossy(bytes: &[u8]) -> Vec<String> {
    scan_headers(&String::from_utf8_lossy(bytes))
}
