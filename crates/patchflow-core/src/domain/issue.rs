//! Input value types for one pipeline invocation.

use serde::{Deserialize, Serialize};

/// The composite input for one invocation: raw issue-plus-code blob, the
/// in-scope script names, and the benchmark instance id.
///
/// Created once per invocation and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContext {
    /// Raw composite text: a system header line followed by `<issue>` and
    /// `<code>` delimited regions.
    pub raw_text: String,
    /// Files the patch is allowed to touch, in priority order.
    pub script_names: Vec<String>,
    /// Stable identifier for the issue instance.
    pub instance_id: String,
}

impl IssueContext {
    pub fn new(
        raw_text: impl Into<String>,
        script_names: Vec<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            raw_text: raw_text.into(),
            script_names,
            instance_id: instance_id.into(),
        }
    }
}

/// Sub-documents pulled out of the composite blob.
///
/// Derived deterministically from [`IssueContext::raw_text`]; never mutated
/// after extraction. `issue_body` and `code_body` are guaranteed non-empty —
/// extraction fails explicitly rather than yielding empty regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// First line of the input, retained for prompt assembly.
    pub system_header: String,
    /// The defect report, with Versions boilerplate stripped and narrowed to
    /// the Actual Results sub-section when one exists.
    pub issue_body: String,
    /// The `<code>` region, verbatim.
    pub code_body: String,
    /// Full user message with URLs and embedded ground-truth patches removed.
    pub cleaned_user_message: String,
}

impl ExtractedDocument {
    /// Issue and code re-wrapped in their delimiters, for locator prompts.
    pub fn issue_and_code(&self) -> String {
        format!(
            "<issue>\n{}\n</issue>\n<code>\n{}\n</code>",
            self.issue_body, self.code_body
        )
    }
}
