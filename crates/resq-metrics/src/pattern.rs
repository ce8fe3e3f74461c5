//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
//! Case-insensitive node-name patterns with SQL `LIKE` wildcards.
//!
//! `%` matches any run of characters and `_` exactly one character. A pattern
//! without `%` is matched anywhere in the name, so `battery` behaves like
//! `%battery%`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    raw: String,
    chars: Vec<char>,
}

impl NodePattern {
    pub fn new(pattern: &str) -> Self {
        let lowered = pattern.trim().to_lowercase();
        let normalized = if lowered.contains('%') {
            lowered
        } else {
            format!("%{lowered}%")
        };
        Self {
            raw: pattern.to_owned(),
            chars: normalized.chars().collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let text: Vec<char> = candidate.to_lowercase().chars().collect();
        like_match(&self.chars, &text)
    }
}

/// A list of patterns; a name matches the set if any pattern matches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<NodePattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| NodePattern::new(p.as_ref())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate))
    }

    pub fn matches_opt(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|c| self.matches(c))
    }
}

// Greedy matcher with single-point backtracking on the last `%` seen.
fn like_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}
