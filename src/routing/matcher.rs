//! Path matching logic.
//!
//! # Responsibilities
//! - Classify a path spec into one of five kinds
//! - Match request paths against the spec (case-sensitive)
//! - Order matchers so the most specific one is tried first
//!
//! # Path Specs
//! ```text
//! ""          root      matches only the empty path
//! "/"         default   matches only "/"
//! "/a/*"      prefix    matches "/a/" and anything below it
//! "*.ext"     suffix    matches any path ending in ".ext"
//! otherwise   exact     matches the spec verbatim
//! ```
//!
//! # Design Decisions
//! - No regex, matching is a string comparison
//! - Total order: root < default < exact < prefix < suffix, longer specs first
//!   within a kind, so the first matching spec is the most specific

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathKind {
    Root,
    Default,
    Exact,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathMatcher {
    kind: PathKind,
    spec: String,
}

impl PathMatcher {
    pub fn new(spec: impl Into<String>) -> Self {
        let spec = spec.into();
        let kind = if spec.is_empty() {
            PathKind::Root
        } else if spec == "/" {
            PathKind::Default
        } else if spec.starts_with('/') && spec.ends_with("/*") {
            PathKind::Prefix
        } else if spec.starts_with("*.") && spec.len() > 2 {
            PathKind::Suffix
        } else {
            PathKind::Exact
        };
        Self { kind, spec }
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn matches(&self, path: &str) -> bool {
        match self.kind {
            PathKind::Root => path.is_empty(),
            PathKind::Default => path == "/",
            PathKind::Exact => path == self.spec,
            // keep the trailing slash: "/a/*" must not match "/a" or "/ab"
            PathKind::Prefix => path.starts_with(&self.spec[..self.spec.len() - 1]),
            PathKind::Suffix => path.ends_with(&self.spec[1..]),
        }
    }
}

impl Ord for PathMatcher {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| other.spec.len().cmp(&self.spec.len()))
            .then_with(|| self.spec.cmp(&other.spec))
    }
}

impl PartialOrd for PathMatcher {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.kind, self.spec)
    }
}
