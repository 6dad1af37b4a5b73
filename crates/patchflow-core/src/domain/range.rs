//! Located ranges and resolved snippets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A file-scoped line interval hypothesized to contain the defect.
///
/// Lines are 1-based and inclusive. Ranges are advisory hints — they are not
/// guaranteed to map onto real content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// Construct a range, rejecting `end < start`.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// Number of lines covered.
    pub fn span(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Literal source text resolved from a range.
///
/// An empty `text` means the range could not be resolved against the code
/// body — a valid, reportable outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub file: String,
    pub range: LineRange,
    pub text: String,
}

/// Output of a locator strategy.
///
/// The model-driven strategy emits line ranges that still need resolving
/// against the code body; the retrieval-driven strategy resolves function
/// bodies directly, so its snippets pass through the mapper untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LocatedRanges {
    /// File → ordered line ranges, keys unique and sorted.
    Lines { files: BTreeMap<String, Vec<LineRange>> },
    /// Already-resolved snippets.
    Resolved { snippets: Vec<Snippet> },
}

impl LocatedRanges {
    pub fn empty() -> Self {
        LocatedRanges::Resolved {
            snippets: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            LocatedRanges::Lines { files } => files.is_empty(),
            LocatedRanges::Resolved { snippets } => snippets.is_empty(),
        }
    }
}
