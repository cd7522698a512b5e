//! Declaration header grammar.
//!
//! A declaration starts on a line of the shape
//!
//! ```text
//! resource <symbolicName> '<Namespace/type>@<apiVersion>' ...
//! ```
//!
//! This is the only boundary signal used anywhere in the crate. The splitter
//! and the baseline index both go through [`parse_header`], so they can never
//! disagree about where a declaration begins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Keyword that opens a declaration.
pub const DECLARATION_KEYWORD: &str = "resource";

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*resource\s+(?P<symbol>[A-Za-z_][A-Za-z0-9_]*)\s+'(?P<type>[^'@\s]+)@(?P<version>[^'\s]+)'",
    )
    .expect("header grammar is a valid regex")
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*name:\s*'(?P<name>[^']+)'\s*$").expect("name rule is a valid regex")
});

/// A recognised declaration header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationHeader {
    /// Local symbolic name
    pub symbolic_name: String,
    /// Resource type, without the version
    pub resource_type: String,
    /// API version marker
    pub api_version: String,
}

impl DeclarationHeader {
    /// The quoted `type@version` literal as it appears in source.
    pub fn type_literal(&self) -> String {
        format!("{}@{}", self.resource_type, self.api_version)
    }
}

/// Recognise a declaration header line.
///
/// Returns `None` for every line that is not a header, including
/// `existing` references written on one line without a version marker.
pub fn parse_header(line: &str) -> Option<DeclarationHeader> {
    let caps = HEADER_RE.captures(line)?;
    Some(DeclarationHeader {
        symbolic_name: caps["symbol"].to_string(),
        resource_type: caps["type"].to_string(),
        api_version: caps["version"].to_string(),
    })
}

/// Whether a line is a declaration header.
pub fn is_header(line: &str) -> bool {
    HEADER_RE.is_match(line)
}

/// Find the top-level literal `name: '...'` property of a declaration.
///
/// Only properties directly inside the declaration's outer braces count, so
/// `name` entries of nested objects (subnets, rules) are ignored.
pub fn declared_name(body: &str) -> Option<String> {
    let mut depth: i32 = 0;
    for line in body.lines() {
        if depth == 1
            && let Some(caps) = NAME_RE.captures(line)
        {
            return Some(caps["name"].to_string());
        }
        depth += nesting_delta(line);
    }
    None
}

/// Net change in `{`/`[` nesting over one line, ignoring quoted text and
/// trailing `//` comments.
fn nesting_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_string => {
                chars.next();
            }
            '\'' => in_string = !in_string,
            '/' if !in_string && chars.peek() == Some(&'/') => break,
            '{' | '[' if !in_string => delta += 1,
            '}' | ']' if !in_string => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Turn an arbitrary resource name into a valid symbolic name.
pub fn symbolic_name_for(name: &str) -> String {
    let mut symbol: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if symbol.is_empty() || symbol.starts_with(|c: char| c.is_ascii_digit()) {
        symbol.insert(0, '_');
    }
    symbol
}
