//! Turning raw upstream strings into comparable versions.

use regex::{Captures, Regex};

/// Default template when a feed declares `versionRegex` without `versionFormat`.
pub const DEFAULT_FORMAT: &str = "$1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("pattern '{pattern}' does not match '{input}'")]
    NoMatch { pattern: String, input: String },

    #[error("invalid version pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// A per-package `versionRegex` / `versionFormat` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub pattern: String,
    pub format: String,
}

impl Extraction {
    pub fn new(pattern: impl Into<String>, format: Option<String>) -> Self {
        Self {
            pattern: pattern.into(),
            format: format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        }
    }

    pub fn apply(&self, raw: &str) -> Result<String, ExtractError> {
        apply_regex(raw, &self.pattern, &self.format)
    }
}

/// Strip packaging conventions from a raw tag or version string.
///
/// - surrounding whitespace and newlines
/// - a `refs/...` path prefix, up to its last `/`
/// - a leading `v`/`V` immediately followed by a digit
pub fn normalize(raw: &str) -> String {
    let mut version = raw.trim();

    if version.starts_with("refs/") {
        version = version.rsplit('/').next().unwrap_or(version);
    }

    if let Some(rest) = version.strip_prefix(['v', 'V'])
        && rest.starts_with(|c: char| c.is_ascii_digit())
    {
        version = rest;
    }

    version.to_string()
}

/// Match `pattern` against `raw` and expand `$1`..`$9` in `format`.
///
/// Groups that did not participate, or beyond those the pattern
/// defines, expand to the empty string.
pub fn apply_regex(raw: &str, pattern: &str, format: &str) -> Result<String, ExtractError> {
    let re = Regex::new(pattern).map_err(|e| ExtractError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    apply_compiled(&re, raw, format)
}

pub(crate) fn apply_compiled(re: &Regex, raw: &str, format: &str) -> Result<String, ExtractError> {
    let captures = re.captures(raw).ok_or_else(|| ExtractError::NoMatch {
        pattern: re.as_str().to_string(),
        input: raw.to_string(),
    })?;
    Ok(expand(format, &captures))
}

fn expand(format: &str, captures: &Captures<'_>) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$'
            && let Some(group) = chars.peek().and_then(|d| d.to_digit(10)).filter(|d| *d >= 1)
        {
            chars.next();
            out.push_str(captures.get(group as usize).map_or("", |m| m.as_str()));
            continue;
        }
        out.push(c);
    }

    out
}

/// Make a version usable as a recipe `pkgver`.
///
/// `pkgver` may not contain hyphens, and the comparator would read one as
/// the release separator, so they become underscores.
pub fn to_pkgver(version: &str) -> String {
    version.replace('-', "_")
}
