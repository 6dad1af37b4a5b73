//! Patch attempts and terminal pipeline outcomes.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Verdict for one drafted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The critic judged the candidate a plausible fix.
    Accepted,
    /// The critic rejected the candidate.
    Rejected,
    /// The generator produced non-patch-shaped text; never sent to critique.
    Unparseable,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Rejected => "rejected",
            Verdict::Unparseable => "unparseable",
        }
    }
}

/// One loop iteration: a candidate patch and the verdict it received.
///
/// `attempt_number` is 1-based and strictly increasing across the whole run,
/// including iterations after a human-triggered budget reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchAttempt {
    pub attempt_number: u32,
    pub candidate_patch: String,
    pub verdict: Verdict,
}

/// Terminal value of one pipeline invocation.
///
/// Escalation is not a failure: it means automated resolution is exhausted
/// and a human declined to extend the budget. Hard failures surface as
/// [`PipelineError`](crate::domain::PipelineError) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// A candidate was accepted.
    Success {
        patch: String,
        history: Vec<PatchAttempt>,
    },
    /// Retries exhausted; full history surfaced for human judgment.
    Escalated { history: Vec<PatchAttempt> },
}

impl PipelineOutcome {
    /// The full attempt history, regardless of how the run ended.
    pub fn history(&self) -> &[PatchAttempt] {
        match self {
            PipelineOutcome::Success { history, .. } => history,
            PipelineOutcome::Escalated { history } => history,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Success { .. } => "success",
            PipelineOutcome::Escalated { .. } => "escalated",
        }
    }
}

/// Check that text looks like a unified diff: non-empty, with `---`/`+++`
/// file headers and at least one `@@ -start,count +start,count @@` hunk
/// header. Hunk arithmetic is not validated here.
pub fn is_patch_shaped(text: &str) -> bool {
    static HUNK_RE: OnceLock<Regex> = OnceLock::new();
    let hunk = HUNK_RE
        .get_or_init(|| Regex::new(r"(?m)^@@ -\d+(?:,\d+)? \+\d+(?:,\d+)? @@").expect("valid regex"));

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let has_headers = trimmed.lines().any(|l| l.starts_with("--- "))
        && trimmed.lines().any(|l| l.starts_with("+++ "));
    has_headers && hunk.is_match(trimmed)
}
