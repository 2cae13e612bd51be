// diff.rs - Prohibited-pattern scanning of unified diffs.
//
// Only added lines are scanned: removing a secret is never a violation.
// Locations come from the diff itself:
//
//   --- a/src/config.rs
//   +++ b/src/config.rs       → file for the following hunks
//   @@ -10,4 +12,6 @@         → next new-file line is 12; 4 old and 6 new
//                               lines follow, all of them hunk content
//
// An added line whose own text starts with `++` shows up as `+++ ...`.
// Inside a hunk the line counts decide, so it is scanned like any other
// added line. Outside a hunk a `+++` line is a header only between `---`
// and `@@`.
//
// Text without hunk headers (a bare list of `+` lines) is still scanned;
// violations then carry the 1-based line index within the diff text.

use keel_model::ProhibitedPattern;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LocalPolicyError;

const SNIPPET_MAX_CHARS: usize = 120;

/// One prohibited pattern found on an added line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffViolation {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// New-file line number, or the diff line index without hunk headers.
    pub line: usize,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

struct CompiledPattern {
    name: String,
    description: String,
    regex: Regex,
}

/// Compiled prohibited patterns, in package order.
pub struct DiffScanner {
    patterns: Vec<CompiledPattern>,
}

impl std::fmt::Debug for DiffScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffScanner")
            .field("patterns", &self.patterns.iter().map(|p| p.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl DiffScanner {
    pub fn new(patterns: &[ProhibitedPattern]) -> Result<Self, LocalPolicyError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let regex = Regex::new(&p.pattern).map_err(|e| LocalPolicyError::InvalidPattern {
                    name: p.name.clone(),
                    reason: e.to_string(),
                })?;
                Ok(CompiledPattern {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>, LocalPolicyError>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Violations in diff order; within a line, in pattern order.
    pub fn scan(&self, diff: &str) -> Vec<DiffViolation> {
        let lines: Vec<&str> = diff.lines().collect();
        let mut violations = Vec::new();
        let mut file: Option<String> = None;
        let mut hunk: Option<Hunk> = None;

        for (index, raw) in lines.iter().copied().enumerate() {
            if let Some(open) = hunk.as_mut() {
                match raw.as_bytes().first() {
                    Some(b'+') => {
                        self.scan_line(&raw[1..], file.as_deref(), open.next_line, &mut violations);
                        open.new_left = open.new_left.saturating_sub(1);
                        open.next_line += 1;
                    }
                    Some(b'-') => open.old_left = open.old_left.saturating_sub(1),
                    Some(b'\\') => continue,
                    // Context; an empty line is context with its space stripped.
                    _ => {
                        open.old_left = open.old_left.saturating_sub(1);
                        open.new_left = open.new_left.saturating_sub(1);
                        open.next_line += 1;
                    }
                }
                if open.is_done() {
                    hunk = None;
                }
                continue;
            }

            if raw.starts_with("@@") {
                hunk = Hunk::parse(raw).filter(|h| !h.is_done());
                continue;
            }
            if let Some(path) = raw.strip_prefix("+++ ") {
                if is_file_header(&lines, index) {
                    file = new_file_path(path);
                    continue;
                }
            }
            if let Some(text) = raw.strip_prefix('+') {
                self.scan_line(text, file.as_deref(), index + 1, &mut violations);
            }
        }
        violations
    }

    fn scan_line(&self, text: &str, file: Option<&str>, line: usize, out: &mut Vec<DiffViolation>) {
        for pattern in &self.patterns {
            if pattern.regex.is_match(text) {
                out.push(DiffViolation {
                    pattern: pattern.name.clone(),
                    file: file.map(str::to_string),
                    line,
                    snippet: snippet(text),
                    description: pattern.description.clone(),
                });
            }
        }
    }
}

/// `b/src/main.rs` → `src/main.rs`; `/dev/null` (deleted file) → None.
fn new_file_path(header: &str) -> Option<String> {
    let path = header.split('\t').next().unwrap_or(header).trim();
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix("b/").unwrap_or(path).to_string())
}

/// Remaining lines of the hunk being read. `+` lines inside a hunk are
/// content even when they look like a `+++` header.
struct Hunk {
    old_left: usize,
    new_left: usize,
    next_line: usize,
}

impl Hunk {
    /// `@@ -a,b +c,d @@`; an omitted count is 1.
    fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split_whitespace().skip(1);
        let (_, old_left) = range(parts.next()?.strip_prefix('-')?)?;
        let (next_line, new_left) = range(parts.next()?.strip_prefix('+')?)?;
        Some(Self {
            old_left,
            new_left,
            next_line,
        })
    }

    fn is_done(&self) -> bool {
        self.old_left == 0 && self.new_left == 0
    }
}

fn range(spec: &str) -> Option<(usize, usize)> {
    match spec.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((spec.parse().ok()?, 1)),
    }
}

/// A `+++` line outside a hunk names the new file only as part of a
/// `---`/`+++`/`@@` triple. Anything else is an added line.
fn is_file_header(lines: &[&str], index: usize) -> bool {
    let after_old = index > 0 && lines[index - 1].starts_with("--- ");
    let before_hunk = lines.get(index + 1).is_some_and(|next| next.starts_with("@@"));
    after_old && before_hunk
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(SNIPPET_MAX_CHARS).collect();
    cut.push_str("...");
    cut
}
