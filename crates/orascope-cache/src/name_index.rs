//! Pattern-searchable name index
//!
//! A sorted array of upper-cased names supporting exact lookup, prefix
//! range scans and bounded substring scans. Results come back in match
//! tiers: exact first, then prefix, then substring, lexicographic within
//! each tier. Sub-second at 10^4 names without any auxiliary structure.

use orascope_core::{OrascopeError, Result};

/// A parsed search pattern: a glob with `%` wildcards, or a plain
/// case-insensitive substring when no `%` is present.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    /// Literal segments between `%` wildcards, upper-cased
    segments: Vec<String>,
    anchored_start: bool,
    anchored_end: bool,
    /// The single literal fragment, when the pattern has exactly one; used
    /// for tiering and the prefix fast path
    core: Option<String>,
}

impl SearchPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(OrascopeError::InvalidArgument(
                "search pattern must not be empty".to_string(),
            ));
        }
        let upper = raw.to_ascii_uppercase();

        if !upper.contains('%') {
            // Bare fragment: substring semantics.
            return Ok(Self {
                segments: vec![upper.clone()],
                anchored_start: false,
                anchored_end: false,
                core: Some(upper),
            });
        }

        let segments: Vec<String> = upper
            .split('%')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if segments.is_empty() {
            // Wildcards only: match everything, bounded by the limit.
            return Ok(Self {
                segments,
                anchored_start: false,
                anchored_end: false,
                core: None,
            });
        }
        let core = (segments.len() == 1).then(|| segments[0].clone());
        Ok(Self {
            segments,
            anchored_start: !upper.starts_with('%'),
            anchored_end: !upper.ends_with('%'),
            core,
        })
    }

    /// The literal fragment for tiering, when the pattern has exactly one.
    pub fn core(&self) -> Option<&str> {
        self.core.as_deref()
    }

    /// Glob test against an upper-cased name.
    pub fn matches(&self, name: &str) -> bool {
        let mut rest = name;
        for (i, segment) in self.segments.iter().enumerate() {
            let first = i == 0;
            let last = i == self.segments.len() - 1;
            if first && self.anchored_start {
                match rest.strip_prefix(segment.as_str()) {
                    Some(after) => rest = after,
                    None => return false,
                }
            } else if last && self.anchored_end {
                return rest.len() >= segment.len() && rest.ends_with(segment.as_str());
            } else {
                match rest.find(segment.as_str()) {
                    Some(pos) => rest = &rest[pos + segment.len()..],
                    None => return false,
                }
            }
        }
        // A fully consumed pattern with an anchored end must have ended at
        // the last segment; anchored-end patterns returned above.
        !self.anchored_end || self.segments.is_empty()
    }
}

/// Sorted, deduplicated index of upper-cased names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex {
    sorted: Vec<String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I: IntoIterator<Item = String>>(names: I) -> Self {
        let mut sorted: Vec<String> = names
            .into_iter()
            .map(|n| n.to_ascii_uppercase())
            .collect();
        sorted.sort();
        sorted.dedup();
        Self { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.sorted
    }

    pub fn contains(&self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        self.sorted.binary_search(&upper).is_ok()
    }

    pub fn insert(&mut self, name: &str) {
        let upper = name.to_ascii_uppercase();
        if let Err(pos) = self.sorted.binary_search(&upper) {
            self.sorted.insert(pos, upper);
        }
    }

    pub fn remove(&mut self, name: &str) {
        let upper = name.to_ascii_uppercase();
        if let Ok(pos) = self.sorted.binary_search(&upper) {
            self.sorted.remove(pos);
        }
    }

    /// Tier-ordered bounded search: exact match, then prefix matches, then
    /// the remaining glob/substring matches, lexicographic within tiers.
    pub fn search(&self, pattern: &SearchPattern, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }
        let mut out = Vec::new();

        match pattern.core() {
            Some(core) => {
                let core = core.to_string();

                // Tier 1: exact.
                if self.sorted.binary_search(&core).is_ok() && pattern.matches(&core) {
                    out.push(core.clone());
                    if out.len() >= limit {
                        return out;
                    }
                }

                // Tier 2: prefix range, O(log N) to locate.
                let start = self.sorted.partition_point(|n| n.as_str() < core.as_str());
                for name in &self.sorted[start..] {
                    if !name.starts_with(&core) {
                        break;
                    }
                    if name == &core {
                        continue;
                    }
                    if pattern.matches(name) {
                        out.push(name.clone());
                        if out.len() >= limit {
                            return out;
                        }
                    }
                }

                // Tier 3: bounded scan for everything else.
                for name in &self.sorted {
                    if name.starts_with(&core) {
                        continue;
                    }
                    if pattern.matches(name) {
                        out.push(name.clone());
                        if out.len() >= limit {
                            return out;
                        }
                    }
                }
            }
            None => {
                // Multi-fragment glob: no meaningful tiering, lexicographic scan.
                for name in &self.sorted {
                    if pattern.matches(name) {
                        out.push(name.clone());
                        if out.len() >= limit {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }
}
