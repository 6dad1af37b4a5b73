//! Retrieval-driven range location.
//!
//! Looks up precomputed candidate symbols for the instance in the
//! symbol-change index, keeps the best lexical match per candidate group,
//! and resolves each kept symbol to its enclosing function body in the code
//! body. Groups with no retrievable member contribute nothing — that is a
//! thin result, not an error.
//!
//! The `Bm25` scoring mode is a reserved placeholder carried over from the
//! observed design: it is selectable but yields no ranges.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ExtractedDocument, LineRange, LocatedRanges, Result, Snippet};
use crate::retrieve;
use crate::services::SymbolChangeIndex;

/// Scoring method for candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalScoring {
    #[default]
    Jaccard,
    /// Reserved; produces no ranges.
    Bm25,
}

/// Locator backed by the symbol-change index.
pub struct RetrievalLocator {
    index: Arc<dyn SymbolChangeIndex>,
    scoring: RetrievalScoring,
}

impl RetrievalLocator {
    pub fn new(index: Arc<dyn SymbolChangeIndex>, scoring: RetrievalScoring) -> Self {
        Self { index, scoring }
    }
}

/// Find the body of `def <name>(…)` in the code body.
///
/// The body runs from the definition line up to (not including) the next
/// line that starts another definition. A definition that is not followed by
/// another one is treated as unresolvable, matching the non-greedy
/// through-to-next-marker contract.
///
/// Returns the trimmed body text and its 1-based line span.
fn resolve_function_body(code_body: &str, name: &str) -> Option<(String, LineRange)> {
    let lines: Vec<&str> = code_body.lines().collect();

    let is_def_line = |line: &str, wanted: Option<&str>| {
        // Tolerate a leading line-number prefix as emitted by some corpora.
        let stripped = line
            .trim_start()
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start();
        match wanted {
            Some(name) => {
                stripped
                    .strip_prefix("def ")
                    .map(|rest| {
                        let rest = rest.trim_start();
                        rest.strip_prefix(name)
                            .map(|after| after.trim_start().starts_with('('))
                            .unwrap_or(false)
                    })
                    .unwrap_or(false)
            }
            None => stripped.starts_with("def "),
        }
    };

    let start = lines.iter().position(|l| is_def_line(l, Some(name)))?;
    let next_def = lines[start + 1..]
        .iter()
        .position(|l| is_def_line(l, None))?;
    let end = start + next_def; // inclusive index of the last body line

    let text = lines[start..=end].join("\n").trim().to_string();
    let range = LineRange::new(start as u32 + 1, end as u32 + 1)?;
    Some((text, range))
}

#[async_trait]
impl super::RangeLocator for RetrievalLocator {
    async fn locate(
        &self,
        doc: &ExtractedDocument,
        _script_names: &[String],
        instance_id: &str,
    ) -> Result<LocatedRanges> {
        if self.scoring == RetrievalScoring::Bm25 {
            // Reserved mode: selectable, but intentionally yields nothing.
            return Ok(LocatedRanges::empty());
        }

        let Some(groups) = self.index.changes_for(instance_id) else {
            debug!(
                event = "locating.unindexed",
                instance_id = %instance_id,
                "no symbol-change entry for instance"
            );
            return Ok(LocatedRanges::empty());
        };

        let mut snippets = Vec::new();
        for group in &groups {
            let Some(&best) = retrieve::rank(&doc.issue_body, group).first() else {
                continue;
            };
            let descriptor = &group[best];
            let symbol = descriptor.rsplit('.').next().unwrap_or(descriptor);

            if let Some((text, range)) = resolve_function_body(&doc.code_body, symbol) {
                snippets.push(Snippet {
                    file: descriptor.clone(),
                    range,
                    text,
                });
            }
        }

        Ok(LocatedRanges::Resolved { snippets })
    }
}
