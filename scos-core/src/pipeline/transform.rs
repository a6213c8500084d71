//! Base-image rewriting for build recipes.
//!
//! Rewriting is a line transform driven by [`RULES`]. A line is either
//! rewritten by exactly one rule or passed through byte for byte, so comments,
//! whitespace, line endings and every other `FROM` line survive untouched.
//! Rewritten lines never match a rule again, which makes the transform
//! idempotent.

use crate::error::{Result, ScosError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// One matcher/rewriter pair.
pub struct RewriteRule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl RewriteRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        // Patterns are compile-time constants covered by the tests below.
        let pattern = Regex::new(pattern).unwrap_or_else(|e| panic!("rule {}: {}", name, e));
        Self { name, pattern, replacement }
    }

    /// Rewritten line, or `None` when the rule does not apply.
    pub fn apply(&self, line: &str) -> Option<String> {
        if !self.pattern.is_match(line) {
            return None;
        }
        Some(self.pattern.replace(line, self.replacement).into_owned())
    }
}

/// `FROM <host>/ocp/<version>:base-rhelN` with optional `--flag` arguments and trailing `AS name`.
const OCP_BASE: &str = r"^(?P<prefix>\s*(?i:from)\s+(?:--\S+\s+)*)(?P<host>[^\s/]+)/ocp/(?P<version>[^\s/:@]+):base-rhel";
const TAIL: &str = r"(?P<rest>\s.*)?$";

/// Rule table, applied in order; the first matching rule wins.
pub static RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new(
            "ocp-base-rhel9",
            &format!("{}9{}", OCP_BASE, TAIL),
            "${prefix}${host}/origin/scos-${version}:base-stream9${rest}",
        ),
        RewriteRule::new(
            "ocp-base-rhel8",
            &format!("{}8{}", OCP_BASE, TAIL),
            "${prefix}${host}/origin/scos-${version}:base-stream8${rest}",
        ),
    ]
});

/// A single rewritten line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRewrite {
    /// 1-based line number.
    pub line: usize,
    pub rule: String,
    pub before: String,
    pub after: String,
}

/// Rewrite a single line (without its terminator).
pub fn rewrite_line(line: &str) -> Option<(&'static str, String)> {
    RULES.iter().find_map(|rule| rule.apply(line).map(|out| (rule.name, out)))
}

/// Transform recipe content. Lines that are not valid UTF-8 pass through.
pub fn transform(content: &[u8]) -> (Vec<u8>, Vec<LineRewrite>) {
    let mut out = Vec::with_capacity(content.len() + 64);
    let mut rewrites = Vec::new();

    for (idx, raw) in content.split_inclusive(|b| *b == b'\n').enumerate() {
        let (body, terminator) = split_terminator(raw);
        let rewritten = std::str::from_utf8(body)
            .ok()
            .and_then(|line| rewrite_line(line).map(|(rule, after)| (line, rule, after)));

        match rewritten {
            Some((before, rule, after)) => {
                debug!(line = idx + 1, rule, "rewrote base image");
                out.extend_from_slice(after.as_bytes());
                rewrites.push(LineRewrite {
                    line: idx + 1,
                    rule: rule.to_string(),
                    before: before.to_string(),
                    after,
                });
            }
            None => out.extend_from_slice(body),
        }
        out.extend_from_slice(terminator);
    }

    (out, rewrites)
}

fn split_terminator(raw: &[u8]) -> (&[u8], &[u8]) {
    let body_len = if raw.ends_with(b"\r\n") {
        raw.len() - 2
    } else if raw.ends_with(b"\n") {
        raw.len() - 1
    } else {
        raw.len()
    };
    raw.split_at(body_len)
}

/// Transform a recipe file in place, writing only when something changed.
#[instrument]
pub fn transform_file(path: &Path) -> Result<Vec<LineRewrite>> {
    let content = std::fs::read(path)
        .map_err(|e| ScosError::IoError { path: path.to_path_buf(), source: e })?;
    let (transformed, rewrites) = transform(&content);

    if rewrites.is_empty() {
        info!("no base-image lines to rewrite");
        return Ok(rewrites);
    }

    std::fs::write(path, transformed)
        .map_err(|e| ScosError::IoError { path: path.to_path_buf(), source: e })?;
    info!(lines = rewrites.len(), "rewrote base-image lines");
    Ok(rewrites)
}
